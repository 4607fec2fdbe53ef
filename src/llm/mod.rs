//! LLM integration for SQL generation and summarization.
//!
//! The rest of the crate depends only on the [`Oracle`] capability: given a
//! prompt, return a completion. [`LlmClient`] provides it over a local model
//! server (Ollama by default).

mod client;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{LlmClient, LlmConfig, LlmProvider};

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),
    /// API returned an error
    #[error("API error: {0}")]
    Api(String),
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
    /// Model not available
    #[error("Model not found: {0}")]
    ModelNotFound(String),
}

/// Text-completion capability backing SQL generation and summaries.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete a prompt. Blocks the caller's flow until the model answers.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Name of the model behind this oracle, used in logs and comparisons.
    fn name(&self) -> &str;
}
