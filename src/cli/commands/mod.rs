//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod ask;
mod compare;
mod feedback;
mod init;
mod interactive;
mod llm;
mod schema;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use asksql::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "asksql")]
#[command(about = "Ask questions of a SQLite database in plain language")]
#[command(version)]
pub struct Cli {
    /// Database file to query (overrides config file and DATABASE_PATH)
    #[arg(long, short = 'd', global = true)]
    database: Option<PathBuf>,

    /// Data directory holding the sample and feedback databases
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, the sample database and the feedback store
    Init {
        /// Recreate the sample database even if it exists
        #[arg(long)]
        force: bool,
    },

    /// Answer a single question
    Ask {
        /// The question, in plain language
        question: String,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
        /// Include worked examples in the prompt
        #[arg(long)]
        few_shot: bool,
        /// Ask the model to reason step by step
        #[arg(long)]
        chain_of_thought: bool,
        /// Don't use learned examples or corrections
        #[arg(long)]
        no_feedback: bool,
        /// Repair attempts after the first failure
        #[arg(long)]
        max_retries: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask questions in a loop and rate the answers
    Interactive {
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
        /// Skip the ambiguity check before each question
        #[arg(long)]
        no_ambiguity_check: bool,
    },

    /// Show the database schema
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate SQL for one question with several models side by side
    Compare {
        /// The question, in plain language
        question: String,
        /// Models to compare (defaults to the configured list)
        #[arg(short, long = "model")]
        models: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record and inspect feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },

    /// LLM management commands
    Llm {
        #[command(subcommand)]
        command: LlmCommands,
    },
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// Rate a generated query
    Add {
        /// The question that was asked
        question: String,
        /// The SQL that was generated
        sql: String,
        /// Rating from 1 (wrong) to 5 (perfect)
        #[arg(short, long)]
        rating: i64,
        /// Optional comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// Attach a corrected query to a feedback entry
    Correct {
        /// Feedback entry ID
        feedback_id: i64,
        /// The corrected SQL
        corrected_sql: String,
    },

    /// Show feedback statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List low-rated queries
    LowRated {
        /// Maximum entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List recent corrections
    Corrections {
        /// Maximum entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show what the learning engine has to work with
    Status,
}

#[derive(Subcommand)]
enum LlmCommands {
    /// List available models from the configured endpoint
    Models,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data_dir: cli.data_dir,
        database: cli.database,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init { force } => init::cmd_init(&settings, force).await,
        Commands::Ask {
            question,
            model,
            few_shot,
            chain_of_thought,
            no_feedback,
            max_retries,
            json,
        } => {
            let options = ask::AskOptions {
                few_shot,
                chain_of_thought,
                no_feedback,
                max_retries,
                json,
            };
            ask::cmd_ask(&settings, &config, &question, model.as_deref(), options).await
        }
        Commands::Interactive {
            model,
            no_ambiguity_check,
        } => {
            interactive::cmd_interactive(&settings, &config, model.as_deref(), !no_ambiguity_check)
                .await
        }
        Commands::Schema { json } => schema::cmd_schema(&settings, json).await,
        Commands::Compare {
            question,
            models,
            json,
        } => compare::cmd_compare(&settings, &config, &question, &models, json).await,
        Commands::Feedback { command } => match command {
            FeedbackCommands::Add {
                question,
                sql,
                rating,
                comment,
            } => {
                feedback::cmd_feedback_add(&settings, &question, &sql, rating, comment.as_deref())
                    .await
            }
            FeedbackCommands::Correct {
                feedback_id,
                corrected_sql,
            } => feedback::cmd_feedback_correct(&settings, feedback_id, &corrected_sql).await,
            FeedbackCommands::Stats { json } => feedback::cmd_feedback_stats(&settings, json).await,
            FeedbackCommands::LowRated { limit } => {
                feedback::cmd_feedback_low_rated(&settings, limit).await
            }
            FeedbackCommands::Corrections { limit } => {
                feedback::cmd_feedback_corrections(&settings, limit).await
            }
            FeedbackCommands::Status => feedback::cmd_feedback_status(&settings).await,
        },
        Commands::Llm { command } => match command {
            LlmCommands::Models => llm::cmd_llm_models(&config).await,
        },
    }
}
