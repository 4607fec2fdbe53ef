//! Feedback commands.

use console::style;

use asksql::config::Settings;
use asksql::feedback::FeedbackLearning;

use crate::cli::helpers::{open_feedback, truncate};

/// Record a rating for a generated query.
pub async fn cmd_feedback_add(
    settings: &Settings,
    question: &str,
    sql: &str,
    rating: i64,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let repo = open_feedback(settings)?;
    let id = repo.add_feedback(question, sql, rating, comment)?;
    println!(
        "{} Recorded feedback #{} (rating {})",
        style("✓").green(),
        id,
        rating
    );
    Ok(())
}

/// Attach a corrected query to an existing feedback entry.
pub async fn cmd_feedback_correct(
    settings: &Settings,
    feedback_id: i64,
    corrected_sql: &str,
) -> anyhow::Result<()> {
    let repo = open_feedback(settings)?;
    let Some(entry) = repo.get(feedback_id)? else {
        anyhow::bail!("No feedback entry with id {}", feedback_id);
    };
    let id = repo.add_correction(feedback_id, &entry.sql_query, corrected_sql)?;
    println!(
        "{} Recorded correction #{} for feedback #{}",
        style("✓").green(),
        id,
        feedback_id
    );
    Ok(())
}

pub async fn cmd_feedback_stats(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let stats = open_feedback(settings)?.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\n{}", style("Feedback Statistics").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Total Feedback:", stats.total_feedback);
    println!("{:<20} {:.2}", "Average Rating:", stats.average_rating);
    println!("{:<20} {}", "Positive (4-5):", stats.positive_feedback);
    println!("{:<20} {}", "Corrections:", stats.total_corrections);
    Ok(())
}

pub async fn cmd_feedback_low_rated(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let entries = open_feedback(settings)?.low_rated(limit)?;
    if entries.is_empty() {
        println!("{} No low-rated queries", style("✓").green());
        return Ok(());
    }

    let header = format!("{:<6} {:<8} {:<40} {}", "ID", "Rating", "Question", "Comment");
    println!("\n{}", style(header).bold());
    println!("{}", "-".repeat(80));
    for entry in entries {
        println!(
            "{:<6} {:<8} {:<40} {}",
            entry.id,
            entry.rating.value(),
            truncate(&entry.question, 38),
            entry.comment.as_deref().unwrap_or("")
        );
        println!("       {}", style(&entry.sql_query).dim());
    }
    Ok(())
}

pub async fn cmd_feedback_corrections(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let corrections = open_feedback(settings)?.corrections(limit)?;
    if corrections.is_empty() {
        println!("{} No corrections recorded", style("!").yellow());
        return Ok(());
    }

    for c in corrections {
        println!(
            "\n{} #{} {}",
            style("→").cyan(),
            c.feedback_id,
            style(&c.question).bold()
        );
        println!("  {} {}", style("-").red(), c.original_query);
        println!("  {} {}", style("+").green(), c.corrected_query);
    }
    Ok(())
}

/// Show learning status and suggestions.
pub async fn cmd_feedback_status(settings: &Settings) -> anyhow::Result<()> {
    let learning = FeedbackLearning::new(open_feedback(settings)?);
    let status = learning.status()?;

    println!("\n{}", style("Learning Status").bold());
    println!("{}", "-".repeat(40));
    println!(
        "{:<20} {}",
        "Learning Data:",
        if status.has_learning_data { "Yes" } else { "No" }
    );
    println!("{:<20} {}", "Positive Examples:", status.positive_examples);
    println!("{:<20} {}", "Corrections:", status.corrections);
    println!("{:<20} {}", "Total Feedback:", status.total_feedback);
    println!("{:<20} {:.2}", "Average Rating:", status.average_rating);

    let suggestions = learning.suggest_improvements()?;
    if !suggestions.is_empty() {
        println!("\n{}", style("Suggestions").bold());
        for s in suggestions {
            println!("  {} {}", style("•").yellow(), s);
        }
    }
    Ok(())
}
