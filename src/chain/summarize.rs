use std::sync::Arc;

use crate::llm::{LlmError, Oracle};
use crate::prompts::PromptAssembler;

/// Natural-language summaries of query results.
#[derive(Clone)]
pub struct Summarizer {
    oracle: Arc<dyn Oracle>,
    assembler: PromptAssembler,
}

impl Summarizer {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            assembler: PromptAssembler::default(),
        }
    }

    /// Summarize `formatted` results of `query` as an answer to `question`.
    pub async fn summarize(
        &self,
        question: &str,
        query: &str,
        formatted: &str,
    ) -> Result<String, LlmError> {
        let prompt = self.assembler.summarization(question, query, formatted);
        let summary = self.oracle.complete(&prompt.render()).await?;
        Ok(summary.trim().to_string())
    }
}
