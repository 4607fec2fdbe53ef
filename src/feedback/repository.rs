//! SQLite-backed feedback store.
//!
//! Every operation opens its own connection, so a repository can be cloned
//! freely across tasks. Rows are only ever appended.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;

use super::models::{
    CorrectionEntry, FeedbackEntry, FeedbackStats, Rating, LOW_RATING, POSITIVE_RATING,
};
use super::{RepositoryError, Result};

/// Positive entries needed before exemplars are considered useful.
const MIN_POSITIVE_FOR_LEARNING: u64 = 3;

const FEEDBACK_COLUMNS: &str = "id, question, sql_query, rating, comment, timestamp";

/// Parse a stored timestamp, defaulting to the Unix epoch when malformed.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<FeedbackEntry> {
    let rating: i64 = row.get("rating")?;
    Ok(FeedbackEntry {
        id: row.get("id")?,
        question: row.get("question")?,
        sql_query: row.get("sql_query")?,
        // rows only enter through add_feedback, which validates
        rating: Rating::new(rating).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(e))
        })?,
        comment: row.get("comment")?,
        timestamp: parse_datetime(&row.get::<_, String>("timestamp")?),
    })
}

fn correction_from_row(row: &Row<'_>) -> rusqlite::Result<CorrectionEntry> {
    Ok(CorrectionEntry {
        id: row.get("id")?,
        feedback_id: row.get("feedback_id")?,
        question: row.get("question")?,
        original_query: row.get("original_query")?,
        corrected_query: row.get("corrected_query")?,
        timestamp: parse_datetime(&row.get::<_, String>("timestamp")?),
    })
}

/// Question words used for similarity lookup: longer than three characters
/// once surrounding punctuation is trimmed, lowercased, first occurrence kept.
pub fn keywords(question: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in question.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.chars().count() > 3 && !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Append-only store of ratings and corrections.
#[derive(Debug, Clone)]
pub struct FeedbackRepository {
    db_path: PathBuf,
}

impl FeedbackRepository {
    /// Open (creating if needed) the store at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                sql_query TEXT NOT NULL,
                rating INTEGER NOT NULL,
                comment TEXT,
                timestamp TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS corrections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                feedback_id INTEGER NOT NULL REFERENCES feedback(id),
                original_query TEXT NOT NULL,
                corrected_query TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_feedback_rating
                ON feedback(rating, timestamp DESC);
        "#,
        )?;
        Ok(())
    }

    /// Record a rating. The rating is checked before anything is written.
    pub fn add_feedback(
        &self,
        question: &str,
        sql_query: &str,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<i64> {
        let rating = Rating::new(rating)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO feedback (question, sql_query, rating, comment, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![question, sql_query, rating.value(), comment, now()],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, rating = rating.value(), "Recorded feedback");
        Ok(id)
    }

    /// Record a corrected query for an existing feedback entry.
    pub fn add_correction(
        &self,
        feedback_id: i64,
        original_query: &str,
        corrected_query: &str,
    ) -> Result<i64> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT INTO corrections (feedback_id, original_query, corrected_query, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![feedback_id, original_query, corrected_query, now()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(RepositoryError::UnknownFeedback(feedback_id));
            }
            Err(e) => return Err(e.into()),
        }
        let id = conn.last_insert_rowid();
        debug!(id, feedback_id, "Recorded correction");
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<FeedbackEntry>> {
        let conn = self.connect()?;
        let entry = conn
            .query_row(
                &format!("SELECT {} FROM feedback WHERE id = ?1", FEEDBACK_COLUMNS),
                params![id],
                feedback_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn stats(&self) -> Result<FeedbackStats> {
        let conn = self.connect()?;
        let (total, average, positive): (i64, Option<f64>, i64) = conn.query_row(
            "SELECT COUNT(*), AVG(rating), COALESCE(SUM(rating >= ?1), 0) FROM feedback",
            params![POSITIVE_RATING],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let corrections: i64 =
            conn.query_row("SELECT COUNT(*) FROM corrections", [], |row| row.get(0))?;

        Ok(FeedbackStats {
            total_feedback: total as u64,
            average_rating: average.map(|a| (a * 100.0).round() / 100.0).unwrap_or(0.0),
            positive_feedback: positive as u64,
            total_corrections: corrections as u64,
        })
    }

    fn query_feedback(&self, sql: &str, values: Vec<Value>) -> Result<Vec<FeedbackEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map(params_from_iter(values.iter()), feedback_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Entries rated 2 or lower, most recent first.
    pub fn low_rated(&self, limit: usize) -> Result<Vec<FeedbackEntry>> {
        self.query_feedback(
            &format!(
                "SELECT {} FROM feedback WHERE rating <= ?1
                 ORDER BY timestamp DESC, id DESC LIMIT ?2",
                FEEDBACK_COLUMNS
            ),
            vec![Value::Integer(LOW_RATING.into()), Value::Integer(limit as i64)],
        )
    }

    /// Entries rated 4 or higher, best first, then most recent.
    pub fn positive_examples(&self, limit: usize) -> Result<Vec<FeedbackEntry>> {
        self.query_feedback(
            &format!(
                "SELECT {} FROM feedback WHERE rating >= ?1
                 ORDER BY rating DESC, timestamp DESC, id DESC LIMIT ?2",
                FEEDBACK_COLUMNS
            ),
            vec![
                Value::Integer(POSITIVE_RATING.into()),
                Value::Integer(limit as i64),
            ],
        )
    }

    /// Positive entries whose question shares a keyword with `question`.
    pub fn similar(&self, question: &str, limit: usize) -> Result<Vec<FeedbackEntry>> {
        let keywords = keywords(question);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let clauses = (0..keywords.len())
            .map(|i| format!("LOWER(question) LIKE ?{} ESCAPE '\\'", i + 3))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT {} FROM feedback WHERE rating >= ?1 AND ({})
             ORDER BY rating DESC, timestamp DESC, id DESC LIMIT ?2",
            FEEDBACK_COLUMNS, clauses
        );

        let mut values = vec![
            Value::Integer(POSITIVE_RATING.into()),
            Value::Integer(limit as i64),
        ];
        values.extend(
            keywords
                .iter()
                .map(|kw| Value::Text(format!("%{}%", escape_like(kw)))),
        );
        self.query_feedback(&sql, values)
    }

    /// Corrections joined with their question, most recent first.
    pub fn corrections(&self, limit: usize) -> Result<Vec<CorrectionEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.feedback_id, f.question, c.original_query, c.corrected_query, c.timestamp
             FROM corrections c
             JOIN feedback f ON c.feedback_id = f.id
             ORDER BY c.timestamp DESC, c.id DESC
             LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit as i64], correction_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count_positive(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM feedback WHERE rating >= ?1",
            params![POSITIVE_RATING],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn count_corrections(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM corrections", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// True with at least three positive entries or any correction.
    pub fn has_learning_data(&self) -> Result<bool> {
        Ok(self.count_positive()? >= MIN_POSITIVE_FOR_LEARNING || self.count_corrections()? >= 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repo() -> (tempfile::TempDir, FeedbackRepository) {
        let dir = tempdir().unwrap();
        let repo = FeedbackRepository::new(&dir.path().join("data").join("feedback.db")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            keywords("Show all departments, please!"),
            vec!["show", "departments", "please"]
        );
        assert!(keywords("How is it").is_empty());
        assert_eq!(keywords("Salary salary SALARY?"), vec!["salary"]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[test]
    fn test_add_and_get() {
        let (_dir, repo) = repo();
        let id = repo
            .add_feedback("How many employees?", "SELECT COUNT(*) FROM employees", 5, Some("great"))
            .unwrap();
        let entry = repo.get(id).unwrap().unwrap();
        assert_eq!(entry.question, "How many employees?");
        assert_eq!(entry.rating.value(), 5);
        assert_eq!(entry.comment.as_deref(), Some("great"));
        assert!(repo.get(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_invalid_rating_not_persisted() {
        let (_dir, repo) = repo();
        for bad in [0, 6, -3] {
            let err = repo.add_feedback("q", "SELECT 1", bad, None).unwrap_err();
            assert!(matches!(err, RepositoryError::InvalidRating(v) if v == bad));
        }
        assert_eq!(repo.stats().unwrap().total_feedback, 0);
    }

    #[test]
    fn test_stats() {
        let (_dir, repo) = repo();
        assert_eq!(repo.stats().unwrap(), FeedbackStats::default());

        repo.add_feedback("a", "SELECT 1", 5, None).unwrap();
        repo.add_feedback("b", "SELECT 2", 4, None).unwrap();
        let low = repo.add_feedback("c", "SELECT 3", 1, None).unwrap();
        repo.add_correction(low, "SELECT 3", "SELECT 4").unwrap();

        let stats = repo.stats().unwrap();
        assert_eq!(stats.total_feedback, 3);
        assert_eq!(stats.average_rating, 3.33);
        assert_eq!(stats.positive_feedback, 2);
        assert_eq!(stats.total_corrections, 1);
    }

    #[test]
    fn test_correction_requires_feedback() {
        let (_dir, repo) = repo();
        let err = repo.add_correction(42, "SELECT 1", "SELECT 2").unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownFeedback(42)));
        assert_eq!(repo.count_corrections().unwrap(), 0);
    }

    #[test]
    fn test_orderings() {
        let (_dir, repo) = repo();
        repo.add_feedback("first good", "SELECT 1", 4, None).unwrap();
        repo.add_feedback("best", "SELECT 2", 5, None).unwrap();
        repo.add_feedback("second good", "SELECT 3", 4, None).unwrap();
        repo.add_feedback("bad one", "SELECT 4", 1, None).unwrap();
        repo.add_feedback("bad two", "SELECT 5", 2, None).unwrap();
        repo.add_feedback("middling", "SELECT 6", 3, None).unwrap();

        let positive: Vec<_> = repo
            .positive_examples(10)
            .unwrap()
            .into_iter()
            .map(|e| e.question)
            .collect();
        assert_eq!(positive, vec!["best", "second good", "first good"]);
        assert_eq!(repo.positive_examples(1).unwrap().len(), 1);

        let low: Vec<_> = repo
            .low_rated(10)
            .unwrap()
            .into_iter()
            .map(|e| e.question)
            .collect();
        assert_eq!(low, vec!["bad two", "bad one"]);
    }

    #[test]
    fn test_similar() {
        let (_dir, repo) = repo();
        repo.add_feedback("List all departments", "SELECT * FROM departments", 5, None)
            .unwrap();
        repo.add_feedback("Departments by budget", "SELECT name FROM departments ORDER BY budget", 4, None)
            .unwrap();
        repo.add_feedback("Show departments badly", "SELECT 1", 2, None)
            .unwrap();
        repo.add_feedback("Count employees", "SELECT COUNT(*) FROM employees", 5, None)
            .unwrap();

        let similar = repo.similar("Which departments exist?", 5).unwrap();
        let questions: Vec<_> = similar.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["List all departments", "Departments by budget"]);

        assert!(repo.similar("How is it?", 5).unwrap().is_empty());
        // wildcards in the question match literally
        assert!(repo.similar("100%_done", 5).unwrap().is_empty());
    }

    #[test]
    fn test_learning_readiness() {
        let (_dir, repo) = repo();
        repo.add_feedback("a", "SELECT 1", 5, None).unwrap();
        repo.add_feedback("b", "SELECT 2", 4, None).unwrap();
        assert!(!repo.has_learning_data().unwrap());
        repo.add_feedback("c", "SELECT 3", 5, None).unwrap();
        assert!(repo.has_learning_data().unwrap());
    }

    #[test]
    fn test_correction_alone_enables_learning() {
        let (_dir, repo) = repo();
        let id = repo.add_feedback("q", "SELECT nme FROM employees", 1, None).unwrap();
        assert!(!repo.has_learning_data().unwrap());
        repo.add_correction(id, "SELECT nme FROM employees", "SELECT name FROM employees")
            .unwrap();
        assert!(repo.has_learning_data().unwrap());

        let corrections = repo.corrections(10).unwrap();
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].question, "q");
        assert_eq!(corrections[0].corrected_query, "SELECT name FROM employees");
    }
}
