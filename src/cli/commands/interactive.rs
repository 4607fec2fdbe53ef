//! Interactive question loop with rating.

use console::style;
use tracing::warn;

use asksql::chain::{AmbiguityDetector, ModelComparator, RunOptions, RunResult};
use asksql::config::{Config, Settings};
use asksql::feedback::{FeedbackRepository, Rating};

use crate::cli::helpers::{
    build_chain, llm_config, open_feedback, print_run_result, prompt_line, require_llm, spinner,
};

const HELP: &str = "Commands: compare <question>, stats, learning, help, quit";

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Help,
    Stats,
    Learning,
    Compare(&'a str),
    Question(&'a str),
    Empty,
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => return Input::Empty,
            "quit" | "exit" | "q" => return Input::Quit,
            "help" | "?" => return Input::Help,
            "stats" => return Input::Stats,
            "learning" => return Input::Learning,
            _ => {}
        }
        match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) if cmd.eq_ignore_ascii_case("compare") => Input::Compare(rest.trim()),
            _ => Input::Question(line),
        }
    }
}

/// Answer to the rating prompt.
#[derive(Debug, PartialEq, Eq)]
enum RatingInput {
    Skip,
    Rated(Rating),
    Invalid,
}

fn parse_rating(input: &str) -> RatingInput {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("s") {
        return RatingInput::Skip;
    }
    match input.parse::<i64>().ok().and_then(|v| Rating::new(v).ok()) {
        Some(rating) => RatingInput::Rated(rating),
        None => RatingInput::Invalid,
    }
}

/// Ask questions until the user quits, offering to rate each generated query.
pub async fn cmd_interactive(
    settings: &Settings,
    config: &Config,
    model: Option<&str>,
    check_ambiguity: bool,
) -> anyhow::Result<()> {
    let llm = llm_config(config, model);
    require_llm(&llm).await?;

    let mut chain = build_chain(settings, config, config.chain.clone(), model)?;
    let repo = open_feedback(settings)?;
    let detector = AmbiguityDetector::new(chain.oracle());
    let schema_text = chain.schema_text().to_string();
    let run_options = RunOptions {
        use_feedback_learning: config.feedback.enabled,
        ..Default::default()
    };

    println!(
        "{} asksql interactive ({})",
        style("→").cyan(),
        style(&llm.model).bold()
    );
    println!("  {}", style(HELP).dim());

    while let Some(line) = prompt_line(&format!("\n{} ", style("?").cyan().bold()))? {
        let question = match Input::parse(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => {
                println!("  {}", HELP);
                continue;
            }
            Input::Stats => {
                let stats = repo.stats()?;
                println!(
                    "  {} entries, average {:.2}, {} positive, {} corrections",
                    stats.total_feedback,
                    stats.average_rating,
                    stats.positive_feedback,
                    stats.total_corrections
                );
                continue;
            }
            Input::Learning => {
                let learning = match chain.learning() {
                    Some(learning) => learning,
                    None => {
                        println!("  Feedback learning is disabled");
                        continue;
                    }
                };
                let status = learning.status()?;
                println!(
                    "  {} positive examples, {} corrections",
                    status.positive_examples, status.corrections
                );
                for s in learning.suggest_improvements()? {
                    println!("  {} {}", style("•").yellow(), s);
                }
                continue;
            }
            Input::Compare(question) => {
                if question.is_empty() {
                    println!("  Usage: compare <question>");
                    continue;
                }
                compare(config, question, &schema_text).await;
                continue;
            }
            Input::Question(question) => question,
        };

        if check_ambiguity && !confirm_clear(&detector, question, &schema_text).await? {
            continue;
        }

        let pb = spinner("Generating SQL...");
        let result = chain.run(question, &run_options).await;
        pb.finish_and_clear();

        print_run_result(&result, config.chain.format_max_rows);
        rate(&repo, &result)?;
    }

    chain.close();
    println!("{} Bye", style("✓").green());
    Ok(())
}

/// Screen the question; returns false if the user backs out.
async fn confirm_clear(
    detector: &AmbiguityDetector,
    question: &str,
    schema_text: &str,
) -> anyhow::Result<bool> {
    let ambiguous = match detector.detect(question, schema_text).await {
        Ok(ambiguous) => ambiguous,
        Err(e) => {
            warn!("Ambiguity check failed: {}", e);
            return Ok(true);
        }
    };
    if !ambiguous {
        return Ok(true);
    }

    println!("{} This question may be ambiguous", style("!").yellow());
    match detector.clarify(question, schema_text).await {
        Ok(interpretations) if interpretations != "CLEAR" => {
            for line in interpretations.lines() {
                println!("  {}", line);
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Clarification failed: {}", e),
    }

    let answer = prompt_line("Continue anyway? [y/N] ")?.unwrap_or_default();
    Ok(answer.eq_ignore_ascii_case("y"))
}

async fn compare(config: &Config, question: &str, schema_text: &str) {
    let comparator = ModelComparator::from_config(&config.llm, &config.models);
    let pb = spinner(format!("Asking {} models...", config.models.len()));
    let results = comparator.compare(question, schema_text).await;
    pb.finish_and_clear();

    for result in results {
        match (result.query, result.error) {
            (Some(query), _) => println!(
                "  {} {} {}",
                style(&result.model).bold(),
                style(format!("({:.2}s)", result.elapsed_secs)).dim(),
                style(query).cyan()
            ),
            (None, error) => println!(
                "  {} {} {}",
                style(&result.model).bold(),
                style("✗").red(),
                error.unwrap_or_default()
            ),
        }
    }
}

/// Rating flow: 1-5 or skip, optional comment, correction for low ratings.
fn rate(repo: &FeedbackRepository, result: &RunResult) -> anyhow::Result<()> {
    let Some(ref query) = result.sql_query else {
        return Ok(());
    };

    let rating = loop {
        let Some(input) = prompt_line("Rate this query (1-5, s to skip): ")? else {
            return Ok(());
        };
        match parse_rating(&input) {
            RatingInput::Skip => return Ok(()),
            RatingInput::Rated(rating) => break rating,
            RatingInput::Invalid => println!("  Enter a number from 1 to 5, or s"),
        }
    };

    let comment = prompt_line("Comment (optional): ")?.filter(|c| !c.is_empty());
    let id = repo.add_feedback(
        &result.question,
        query,
        rating.value() as i64,
        comment.as_deref(),
    )?;
    println!("{} Thanks, recorded #{}", style("✓").green(), id);

    if rating.is_low() {
        let corrected = prompt_line("Corrected SQL (blank to skip): ")?.unwrap_or_default();
        if !corrected.is_empty() {
            repo.add_correction(id, query, &corrected)?;
            println!("{} Correction saved", style("✓").green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse("  "), Input::Empty);
        assert_eq!(Input::parse("EXIT"), Input::Quit);
        assert_eq!(Input::parse("stats"), Input::Stats);
        assert_eq!(
            Input::parse("compare How many employees?"),
            Input::Compare("How many employees?")
        );
        assert_eq!(
            Input::parse("How many stats are there?"),
            Input::Question("How many stats are there?")
        );
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating(""), RatingInput::Skip);
        assert_eq!(parse_rating("S"), RatingInput::Skip);
        assert_eq!(parse_rating("0"), RatingInput::Invalid);
        assert_eq!(parse_rating("six"), RatingInput::Invalid);
        assert_eq!(parse_rating(" 2 "), RatingInput::Rated(Rating::new(2).unwrap()));
    }
}
