//! Shared helper functions for CLI commands.

use std::io::{self, Write};
use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use asksql::chain::{ChainConfig, RunResult, TextToSqlChain};
use asksql::config::{Config, Settings};
use asksql::database::Database;
use asksql::feedback::{FeedbackLearning, FeedbackRepository};
use asksql::llm::{LlmClient, LlmConfig, Oracle};
use asksql::query::format_results;

/// Spinner shown while the model works.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message.into());
    pb
}

/// LLM settings with an optional `--model` override applied.
pub fn llm_config(config: &Config, model: Option<&str>) -> LlmConfig {
    match model {
        Some(m) => config.llm.clone().with_model(m),
        None => config.llm.clone(),
    }
}

/// Open the feedback store named by the settings.
pub fn open_feedback(settings: &Settings) -> anyhow::Result<FeedbackRepository> {
    Ok(FeedbackRepository::new(&settings.feedback_db_path)?)
}

/// Build a chain over the configured database, seeding the sample if absent.
pub fn build_chain(
    settings: &Settings,
    config: &Config,
    chain_config: ChainConfig,
    model: Option<&str>,
) -> anyhow::Result<TextToSqlChain> {
    settings.ensure_directories()?;
    let db = Database::open_or_seed(&settings.database_path)?;
    let oracle: Arc<dyn Oracle> = Arc::new(LlmClient::new(llm_config(config, model)));

    let mut chain = TextToSqlChain::new(db, oracle, chain_config)?
        .with_feedback_style(config.feedback.style);
    if config.feedback.enabled {
        let learning = FeedbackLearning::new(open_feedback(settings)?);
        chain = chain.with_feedback(learning, config.feedback.learning);
    }
    Ok(chain)
}

/// Fail early with a hint when the model endpoint is down.
pub async fn require_llm(config: &LlmConfig) -> anyhow::Result<()> {
    let client = LlmClient::new(config.clone());
    if !client.is_available().await {
        anyhow::bail!("{}", config.availability_hint());
    }
    Ok(())
}

/// Print a run the way `ask` and `interactive` show it.
pub fn print_run_result(result: &RunResult, max_rows: usize) {
    for attempt in &result.attempts {
        if let Some(ref error) = attempt.error {
            println!(
                "  {} Attempt {}: {}",
                style("✗").red(),
                attempt.attempt,
                error
            );
        }
    }

    if let Some(ref query) = result.sql_query {
        println!("\n{}", style("SQL").bold());
        println!("  {}", style(query).cyan());
    }

    if let Some(ref results) = result.results {
        println!("\n{}", style("Results").bold());
        for line in format_results(&results.columns, &results.rows, max_rows).lines() {
            println!("  {}", line);
        }
    }

    match (&result.summary, &result.error) {
        (Some(summary), _) => {
            println!("\n{}", style("Answer").bold());
            println!("  {}", summary);
        }
        (None, Some(error)) => {
            println!("\n{} {}", style("✗").red(), error);
        }
        (None, None) => {}
    }
}

/// Prompt on stdout and read one trimmed line. `None` at end of input.
pub fn prompt_line(prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Shorten text for table display.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer question", 10), "a much ...");
    }
}
