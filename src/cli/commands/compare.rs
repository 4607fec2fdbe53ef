//! Model comparison command.

use console::style;

use asksql::chain::ModelComparator;
use asksql::config::{Config, Settings};
use asksql::database::Database;

use crate::cli::helpers::{require_llm, spinner};

/// Generate SQL for `question` with each model and print the answers side by side.
pub async fn cmd_compare(
    settings: &Settings,
    config: &Config,
    question: &str,
    models: &[String],
    json: bool,
) -> anyhow::Result<()> {
    require_llm(&config.llm).await?;

    let models = if models.is_empty() {
        config.models.as_slice()
    } else {
        models
    };
    if models.is_empty() {
        anyhow::bail!("No models to compare; pass --model or set `models` in the config file");
    }

    settings.ensure_directories()?;
    let mut db = Database::open_or_seed(&settings.database_path)?;
    let schema_text = db.introspect_schema()?.render();
    db.disconnect();

    let comparator = ModelComparator::from_config(&config.llm, models);
    let pb = (!json).then(|| spinner(format!("Asking {} models...", models.len())));
    let results = comparator.compare(question, &schema_text).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("{} {}", style("?").cyan().bold(), style(question).bold());
    for result in &results {
        println!(
            "\n{} {}",
            style(&result.model).bold(),
            style(format!("({:.2}s)", result.elapsed_secs)).dim()
        );
        println!("{}", "-".repeat(40));
        match (&result.query, &result.error) {
            (Some(query), _) => println!("  {}", style(query).cyan()),
            (None, Some(error)) => println!("  {} {}", style("✗").red(), error),
            (None, None) => println!("  {}", style("(no output)").dim()),
        }
    }

    Ok(())
}
