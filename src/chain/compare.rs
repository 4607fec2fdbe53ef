//! Side-by-side SQL generation across several models.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::info;

use crate::llm::{LlmClient, LlmConfig, Oracle};
use crate::prompts::PromptAssembler;
use crate::query::clean_sql;

/// One model's answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub model: String,
    pub query: Option<String>,
    /// Wall-clock seconds for the call.
    pub elapsed_secs: f64,
    pub error: Option<String>,
}

impl ModelComparison {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ModelComparator {
    oracles: Vec<Arc<dyn Oracle>>,
    assembler: PromptAssembler,
}

impl ModelComparator {
    pub fn new(oracles: Vec<Arc<dyn Oracle>>) -> Self {
        Self {
            oracles,
            assembler: PromptAssembler::default(),
        }
    }

    /// One client per model name, all sharing `base`'s endpoint and settings.
    pub fn from_config(base: &LlmConfig, models: &[String]) -> Self {
        let oracles = models
            .iter()
            .map(|m| Arc::new(LlmClient::new(base.clone().with_model(m))) as Arc<dyn Oracle>)
            .collect();
        Self::new(oracles)
    }

    pub fn models(&self) -> Vec<&str> {
        self.oracles.iter().map(|o| o.name()).collect()
    }

    /// Ask every model concurrently. Results keep the configured order.
    pub async fn compare(&self, question: &str, schema_text: &str) -> Vec<ModelComparison> {
        let prompt = self.assembler.model_comparison(question, schema_text).render();
        let calls = self.oracles.iter().map(|oracle| {
            let prompt = prompt.as_str();
            async move {
                let start = Instant::now();
                let outcome = oracle.complete(prompt).await;
                let elapsed_secs = start.elapsed().as_secs_f64();
                info!(model = oracle.name(), elapsed_secs, ok = outcome.is_ok(), "Model compared");
                match outcome {
                    Ok(raw) => ModelComparison {
                        model: oracle.name().to_string(),
                        query: Some(clean_sql(&raw)),
                        elapsed_secs,
                        error: None,
                    },
                    Err(e) => ModelComparison {
                        model: oracle.name().to_string(),
                        query: None,
                        elapsed_secs,
                        error: Some(e.to_string()),
                    },
                }
            }
        });
        join_all(calls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Slow {
        name: String,
        delay_ms: u64,
        reply: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Oracle for Slow {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.reply
                .map(str::to_string)
                .map_err(|e| LlmError::Connection(e.to_string()))
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn test_compare_keeps_order_and_errors() {
        let comparator = ModelComparator::new(vec![
            Arc::new(Slow {
                name: "slow".into(),
                delay_ms: 50,
                reply: Ok("```sql\nSELECT COUNT(*) FROM employees\n```"),
            }) as Arc<dyn Oracle>,
            Arc::new(Slow {
                name: "broken".into(),
                delay_ms: 0,
                reply: Err("refused"),
            }) as Arc<dyn Oracle>,
        ]);
        assert_eq!(comparator.models(), vec!["slow", "broken"]);

        let results = comparator.compare("How many employees?", "schema").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].model, "slow");
        assert_eq!(results[0].query.as_deref(), Some("SELECT COUNT(*) FROM employees"));
        assert!(results[0].is_success());
        assert_eq!(results[1].model, "broken");
        assert!(results[1].query.is_none());
        assert_eq!(results[1].error.as_deref(), Some("Connection error: refused"));
    }

    #[test]
    fn test_from_config() {
        let models = vec!["llama3:latest".to_string(), "mistral:7b".to_string()];
        let comparator = ModelComparator::from_config(&LlmConfig::base_default(), &models);
        assert_eq!(comparator.models(), vec!["llama3:latest", "mistral:7b"]);
    }
}
