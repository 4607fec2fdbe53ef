//! asksql - natural-language questions to SQL.
//!
//! Generates SQL with a local LLM, validates and executes it against a
//! SQLite database, repairs failures by feeding the error back to the model,
//! and learns from user ratings and corrections.

pub mod chain;
pub mod config;
pub mod database;
pub mod feedback;
pub mod llm;
pub mod prompts;
pub mod query;

pub use chain::{Attempt, RunOptions, RunResult, TextToSqlChain};
pub use config::{Config, Settings};
