//! Single-question command.

use console::style;

use asksql::chain::RunOptions;
use asksql::config::{Config, Settings};
use asksql::query::format_results_as_maps;

use crate::cli::helpers::{build_chain, llm_config, print_run_result, require_llm, spinner};

/// Flags for `asksql ask`.
pub struct AskOptions {
    pub few_shot: bool,
    pub chain_of_thought: bool,
    pub no_feedback: bool,
    pub max_retries: Option<u32>,
    pub json: bool,
}

impl AskOptions {
    fn run_options(&self, config: &Config) -> RunOptions {
        RunOptions {
            max_retries: self.max_retries,
            use_feedback_learning: config.feedback.enabled && !self.no_feedback,
            ..RunOptions::with_flags(self.few_shot, self.chain_of_thought)
        }
    }
}

/// Answer one question and print the outcome.
pub async fn cmd_ask(
    settings: &Settings,
    config: &Config,
    question: &str,
    model: Option<&str>,
    options: AskOptions,
) -> anyhow::Result<()> {
    require_llm(&llm_config(config, model)).await?;

    let mut chain = build_chain(settings, config, config.chain.clone(), model)?;
    let run_options = options.run_options(config);

    let pb = (!options.json).then(|| spinner("Generating SQL..."));
    let result = chain.run(question, &run_options).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    chain.close();

    if options.json {
        // rows as column-keyed objects
        let mut value = serde_json::to_value(&result)?;
        if let Some(ref rs) = result.results {
            value["results"] = serde_json::to_value(format_results_as_maps(&rs.columns, &rs.rows))?;
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} {}", style("?").cyan().bold(), style(question).bold());
        print_run_result(&result, config.chain.format_max_rows);
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
