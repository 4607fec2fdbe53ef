//! Question-to-answer orchestration.
//!
//! [`TextToSqlChain`] runs the bounded generate, check, execute and repair
//! loop. The other modules here are the smaller model-backed helpers used
//! around it.

mod ambiguity;
mod compare;
mod summarize;
mod text_to_sql;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::ResultSet;
use crate::llm::LlmError;
use crate::prompts::PromptMode;
use crate::query::{ExecutionError, ValidationError};

pub use ambiguity::AmbiguityDetector;
pub use compare::{ModelComparator, ModelComparison};
pub use summarize::Summarizer;
pub use text_to_sql::TextToSqlChain;

/// Terminal message when every attempt failed.
pub const EXHAUSTED_MESSAGE: &str = "Failed to generate valid SQL after maximum retries";

/// Orchestration loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Rows included in the text handed to the summarizer.
    #[serde(default = "default_format_max_rows")]
    pub format_max_rows: usize,
    /// Also reject queries containing write keywords anywhere.
    #[serde(default)]
    pub enforce_sanitize: bool,
    /// Deadline for each model call, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_secs: Option<u64>,
}

fn default_max_retries() -> u32 {
    2
}

fn default_format_max_rows() -> usize {
    crate::query::DEFAULT_MAX_ROWS
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            format_max_rows: default_format_max_rows(),
            enforce_sanitize: false,
            attempt_timeout_secs: None,
        }
    }
}

/// Per-run options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Overrides [`ChainConfig::max_retries`].
    pub max_retries: Option<u32>,
    pub mode: PromptMode,
    pub use_feedback_learning: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_retries: None,
            mode: PromptMode::Plain,
            use_feedback_learning: true,
        }
    }
}

impl RunOptions {
    pub fn with_flags(few_shot: bool, chain_of_thought: bool) -> Self {
        Self {
            mode: PromptMode::from_flags(few_shot, chain_of_thought),
            ..Default::default()
        }
    }
}

/// One pass through the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    /// 1-based.
    pub attempt: u32,
    /// None when the failure happened before a query existed.
    pub query: Option<String>,
    pub error: Option<String>,
}

/// Outcome of [`TextToSqlChain::run`].
///
/// Exactly one of `sql_query` and `error` is set. A set `sql_query` comes
/// with `results` and `summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub question: String,
    pub sql_query: Option<String>,
    pub results: Option<ResultSet>,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub attempts: Vec<Attempt>,
}

impl RunResult {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            sql_query: None,
            results: None,
            summary: None,
            error: None,
            attempts: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.sql_query.is_some()
    }
}

/// Why an attempt failed. Every kind is retried until attempts run out.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("{0}")]
    Rejected(ValidationError),
    #[error("{0}")]
    Unsafe(ValidationError),
    #[error("{0}")]
    Execution(#[from] ExecutionError),
    #[error("{0}")]
    Oracle(#[from] LlmError),
    #[error("LLM call timed out after {0}s")]
    Timeout(u64),
    #[error("Summarization failed: {0}")]
    Summarization(LlmError),
}
