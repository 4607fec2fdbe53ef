//! Ambiguity screening for questions before they reach the loop.

use std::sync::Arc;

use tracing::debug;

use crate::llm::{LlmError, Oracle};
use crate::prompts::PromptAssembler;

#[derive(Clone)]
pub struct AmbiguityDetector {
    oracle: Arc<dyn Oracle>,
    assembler: PromptAssembler,
}

impl AmbiguityDetector {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            assembler: PromptAssembler::default(),
        }
    }

    /// Ask the model for a YES/NO verdict. Any `YES` in the reply counts.
    pub async fn detect(&self, question: &str, schema: &str) -> Result<bool, LlmError> {
        let prompt = self.assembler.ambiguity_check(question, schema);
        let reply = self.oracle.complete(&prompt.render()).await?;
        let ambiguous = reply.trim().to_uppercase().contains("YES");
        debug!(ambiguous, "Ambiguity check");
        Ok(ambiguous)
    }

    /// Possible interpretations of an ambiguous question, or `CLEAR`.
    pub async fn clarify(&self, question: &str, schema: &str) -> Result<String, LlmError> {
        let prompt = self.assembler.clarification(question, schema);
        Ok(self.oracle.complete(&prompt.render()).await?.trim().to_string())
    }
}
