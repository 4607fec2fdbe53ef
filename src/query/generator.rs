//! SQL generation over an [`Oracle`].

use std::sync::Arc;

use tracing::debug;

use super::validator::clean_sql;
use crate::llm::{LlmError, Oracle};
use crate::prompts::{LearnedContent, Prompt, PromptAssembler, PromptMode};

/// Turns questions into cleaned SQL text.
#[derive(Clone)]
pub struct QueryGenerator {
    oracle: Arc<dyn Oracle>,
    assembler: PromptAssembler,
}

impl QueryGenerator {
    pub fn new(oracle: Arc<dyn Oracle>, assembler: PromptAssembler) -> Self {
        Self { oracle, assembler }
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    pub fn prompt(
        &self,
        mode: &PromptMode,
        schema: &str,
        question: &str,
        learned: Option<&LearnedContent>,
    ) -> Prompt {
        self.assembler.build(mode, schema, question, learned)
    }

    /// Send an assembled prompt and clean the completion.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let raw = self.oracle.complete(&prompt.render()).await?;
        let sql = clean_sql(&raw);
        debug!(model = self.oracle.name(), sql = %sql, "Generated SQL");
        Ok(sql)
    }

    /// Generate SQL for a fresh question.
    pub async fn generate(
        &self,
        question: &str,
        schema: &str,
        mode: &PromptMode,
        learned: Option<&LearnedContent>,
    ) -> Result<String, LlmError> {
        let prompt = self.prompt(mode, schema, question, learned);
        self.complete(&prompt).await
    }

    /// Generate a corrected query after `previous_query` failed with `error`.
    pub async fn regenerate(
        &self,
        question: &str,
        schema: &str,
        previous_query: &str,
        error: &str,
    ) -> Result<String, LlmError> {
        let mode = PromptMode::ErrorCorrection {
            previous_query: previous_query.to_string(),
            error: error.to_string(),
        };
        self.generate(question, schema, &mode, None).await
    }
}
