//! Lexical SQL gatekeeping.
//!
//! This is not a SQL parser. Queries go through the `sqlparser` tokenizer
//! just far enough to find statement boundaries and the leading verb, which
//! is all the read-only check needs.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use thiserror::Error;

/// Keywords that mark a query as unsafe for [`sanitize`].
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE",
];

/// Statement verbs that end the CTE prefix of a `WITH` statement.
const MAIN_VERBS: &[Keyword] = &[
    Keyword::SELECT,
    Keyword::INSERT,
    Keyword::UPDATE,
    Keyword::DELETE,
    Keyword::REPLACE,
];

/// Why a query was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Empty or invalid query")]
    Empty,
    #[error("Only SELECT queries are allowed")]
    NotSelect,
    #[error("Dangerous keyword detected: {0}")]
    DangerousKeyword(String),
    #[error("Could not tokenize query: {0}")]
    Tokenize(String),
}

fn tokenize(query: &str) -> Result<Vec<Token>, ValidationError> {
    Tokenizer::new(&SQLiteDialect {}, query)
        .tokenize()
        .map_err(|e| ValidationError::Tokenize(e.to_string()))
}

/// Whitespace and comments.
fn is_trivia(token: &Token) -> bool {
    matches!(token, Token::Whitespace(_) | Token::EOF)
}

/// The keyword an unquoted word stands for, if any.
fn keyword(token: &Token) -> Option<Keyword> {
    match token {
        Token::Word(Word {
            keyword,
            quote_style: None,
            ..
        }) if *keyword != Keyword::NoKeyword => Some(*keyword),
        _ => None,
    }
}

/// Significant tokens of each statement, split on `;`, dropping empties.
fn statements(tokens: &[Token]) -> Vec<Vec<&Token>> {
    tokens
        .split(|t| *t == Token::SemiColon)
        .map(|stmt| stmt.iter().filter(|t| !is_trivia(t)).collect::<Vec<_>>())
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

/// Infer the statement's verb from its first keyword.
fn statement_type(stmt: &[&Token]) -> Option<Keyword> {
    let first = stmt.iter().copied().find(|t| !matches!(t, Token::LParen))?;
    let kw = keyword(first)?;
    if kw != Keyword::WITH {
        return Some(kw);
    }

    // WITH ... <verb>: the verb at paren depth 0 after the CTE list
    let mut depth = 0i32;
    for token in stmt.iter().copied() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            _ if depth == 0 => {
                if let Some(verb) = keyword(token).filter(|k| MAIN_VERBS.contains(k)) {
                    return Some(verb);
                }
            }
            _ => {}
        }
    }
    None
}

/// Accept only queries whose first statement reads as a SELECT.
///
/// Later statements are not inspected.
pub fn validate(query: &str) -> Result<(), ValidationError> {
    let tokens = tokenize(query)?;
    let stmts = statements(&tokens);
    let Some(first) = stmts.first() else {
        return Err(ValidationError::Empty);
    };

    if statement_type(first) == Some(Keyword::SELECT) {
        return Ok(());
    }

    // plain identifiers that merely start with SELECT still pass
    let grouped_select = first.iter().any(|t| match t {
        Token::Word(w) if w.quote_style.is_none() && w.keyword == Keyword::NoKeyword => {
            w.value.to_ascii_uppercase().starts_with("SELECT")
        }
        _ => false,
    });
    if grouped_select {
        return Ok(());
    }

    Err(ValidationError::NotSelect)
}

/// Reject queries containing a write keyword anywhere, then normalize layout.
///
/// The scan is a case-insensitive substring match, so identifiers such as
/// `created_at` trip it too.
pub fn sanitize(query: &str) -> Result<String, ValidationError> {
    let upper = query.to_uppercase();
    if let Some(kw) = DANGEROUS_KEYWORDS.iter().find(|kw| upper.contains(*kw)) {
        return Err(ValidationError::DangerousKeyword(kw.to_string()));
    }

    let mut out = String::with_capacity(query.len());
    let mut prev_ident = false;
    for token in tokenize(query)?.iter().filter(|t| !is_trivia(t)) {
        let text = match keyword(token) {
            Some(_) => token.to_string().to_ascii_uppercase(),
            None => token.to_string(),
        };
        let glue = matches!(
            token,
            Token::Comma | Token::RParen | Token::SemiColon | Token::Period
        ) || out.ends_with('(')
            || out.ends_with('.')
            || (prev_ident && *token == Token::LParen);
        if !out.is_empty() && !glue {
            out.push(' ');
        }
        out.push_str(&text);
        prev_ident = matches!(token, Token::Word(_)) && keyword(token).is_none();
    }
    Ok(out)
}

/// Strip markdown fences and comment lines from a model completion.
pub fn clean_sql(raw: &str) -> String {
    let without_fences = raw.replace("```sql", "").replace("```", "");
    without_fences
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
