//! Initialize command.

use console::style;

use asksql::config::Settings;
use asksql::database::seed_sample;
use asksql::feedback::FeedbackRepository;

/// Create the data directory, the sample database and the feedback store.
pub async fn cmd_init(settings: &Settings, force: bool) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    if settings.database_exists() && !force {
        println!(
            "  {} Database already exists: {}",
            style("•").dim(),
            settings.database_path.display()
        );
    } else {
        if force && settings.database_exists() {
            std::fs::remove_file(&settings.database_path)?;
        }
        seed_sample(&settings.database_path)?;
        println!(
            "  {} Created sample database: {}",
            style("✓").green(),
            settings.database_path.display()
        );
    }

    FeedbackRepository::new(&settings.feedback_db_path)?;
    println!(
        "  {} Feedback store ready: {}",
        style("✓").green(),
        settings.feedback_db_path.display()
    );

    println!(
        "{} Initialized asksql in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
