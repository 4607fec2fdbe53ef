//! LLM commands.

use console::style;

use asksql::config::Config;
use asksql::llm::LlmClient;

/// Show the model settings, the models the server offers, and which
/// comparison models are missing.
pub async fn cmd_llm_models(config: &Config) -> anyhow::Result<()> {
    let llm = &config.llm;
    let client = LlmClient::new(llm.clone());

    println!("\n{}", style("Model Server").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Provider:", llm.provider.as_str());
    println!("{:<20} {}", "Endpoint:", llm.endpoint);
    println!("{:<20} {}", "SQL Model:", llm.model);
    println!("{:<20} {}", "Max Tokens:", llm.max_tokens);
    println!("{:<20} {:.2}", "Temperature:", llm.temperature);
    println!("{:<20} {}", "Compare Models:", config.models.join(", "));

    if !client.is_available().await {
        println!("\n{} {}", style("!").yellow(), llm.availability_hint());
        return Ok(());
    }

    let installed = match client.list_models().await {
        Ok(models) => models,
        Err(e) => {
            println!("{} Failed to list models: {}", style("✗").red(), e);
            return Ok(());
        }
    };

    println!("\n{}", style("Installed").bold());
    println!("{}", "-".repeat(40));
    if installed.is_empty() {
        println!("  None. Install one with: ollama pull {}", llm.model);
    }
    for model in &installed {
        let marker = if *model == llm.model {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!("{} {}", marker, model);
    }

    let mut missing: Vec<&String> = std::iter::once(&llm.model)
        .chain(config.models.iter())
        .filter(|m| !installed.contains(m))
        .collect();
    missing.sort();
    missing.dedup();
    if !missing.is_empty() {
        println!("\n{} Not installed:", style("!").yellow());
        for model in missing {
            println!("  {}", model);
        }
    }

    Ok(())
}
