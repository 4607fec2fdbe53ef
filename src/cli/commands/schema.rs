//! Schema command.

use console::style;

use asksql::config::Settings;
use asksql::database::Database;

/// Print the tables and columns of the configured database.
pub async fn cmd_schema(settings: &Settings, json: bool) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let mut db = Database::open_or_seed(&settings.database_path)?;
    let schema = db.introspect_schema()?;
    db.disconnect();

    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    println!(
        "\n{} {}",
        style("Schema").bold(),
        style(settings.database_path.display()).dim()
    );
    println!("{}", "-".repeat(40));
    if schema.is_empty() {
        println!("  No tables");
        return Ok(());
    }
    print!("{}", schema.render());

    Ok(())
}
