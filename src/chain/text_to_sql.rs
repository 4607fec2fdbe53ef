//! The retry-and-repair loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    Attempt, AttemptError, ChainConfig, RunOptions, RunResult, Summarizer, EXHAUSTED_MESSAGE,
};
use crate::database::{Database, DatabaseError, ResultSet, SchemaDescription};
use crate::feedback::{FeedbackLearning, LearningOptions};
use crate::llm::{LlmError, Oracle};
use crate::prompts::{FeedbackStyle, LearnedContent, PromptAssembler, PromptMode};
use crate::query::{format_results, sanitize, validate, QueryExecutor, QueryGenerator};

struct Success {
    query: String,
    results: ResultSet,
    summary: String,
}

/// Converts questions into executed, summarized SQL against one database.
pub struct TextToSqlChain {
    db: Database,
    schema: SchemaDescription,
    schema_text: String,
    oracle: Arc<dyn Oracle>,
    generator: QueryGenerator,
    executor: QueryExecutor,
    summarizer: Summarizer,
    learning: Option<FeedbackLearning>,
    learning_options: LearningOptions,
    config: ChainConfig,
}

impl TextToSqlChain {
    /// Connect to `db` and capture its schema.
    pub fn new(
        mut db: Database,
        oracle: Arc<dyn Oracle>,
        config: ChainConfig,
    ) -> Result<Self, DatabaseError> {
        let schema = db.introspect_schema()?;
        let schema_text = schema.render();
        info!(
            tables = schema.tables().len(),
            "Loaded schema from {}",
            db.path().display()
        );

        Ok(Self {
            db,
            schema,
            schema_text,
            generator: QueryGenerator::new(oracle.clone(), PromptAssembler::default()),
            executor: QueryExecutor::new(),
            summarizer: Summarizer::new(oracle.clone()),
            oracle,
            learning: None,
            learning_options: LearningOptions::default(),
            config,
        })
    }

    /// Enable feedback learning for runs that ask for it.
    pub fn with_feedback(mut self, learning: FeedbackLearning, options: LearningOptions) -> Self {
        self.learning = Some(learning);
        self.learning_options = options;
        self
    }

    pub fn with_feedback_style(mut self, style: FeedbackStyle) -> Self {
        self.generator = QueryGenerator::new(self.oracle.clone(), PromptAssembler::new(style));
        self
    }

    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    pub fn oracle(&self) -> Arc<dyn Oracle> {
        self.oracle.clone()
    }

    pub fn learning(&self) -> Option<&FeedbackLearning> {
        self.learning.as_ref()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Close the database connection. The next run reconnects.
    pub fn close(&mut self) {
        self.db.disconnect();
    }

    /// Answer `question`. Never fails: problems end up in the result.
    pub async fn run(&mut self, question: &str, options: &RunOptions) -> RunResult {
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries);
        let mut result = RunResult::new(question);

        let learned = if options.use_feedback_learning {
            self.learned_content(question)
        } else {
            None
        };

        // attempt numbers are u32, so u32::MAX retries caps at u32::MAX attempts
        let total = max_retries.saturating_add(1);
        for attempt_no in 1..=total {
            debug!(attempt = attempt_no, max = total, "Starting attempt");

            let repair = result.attempts.last().and_then(|a| match (&a.query, &a.error) {
                (Some(query), Some(error)) => Some(PromptMode::ErrorCorrection {
                    previous_query: query.clone(),
                    error: error.clone(),
                }),
                _ => None,
            });
            let mode = repair.as_ref().unwrap_or(&options.mode);

            match self
                .attempt(question, mode, learned.as_ref(), attempt_no, &mut result.attempts)
                .await
            {
                Ok(success) => {
                    info!(attempt = attempt_no, "Query succeeded: {}", success.query);
                    result.sql_query = Some(success.query);
                    result.results = Some(success.results);
                    result.summary = Some(success.summary);
                    break;
                }
                Err(err) => {
                    warn!(attempt = attempt_no, "Attempt failed: {}", err);
                    record_failure(&mut result.attempts, attempt_no, &err);
                }
            }
        }

        if result.sql_query.is_none() {
            result.error = Some(EXHAUSTED_MESSAGE.to_string());
        }
        result
    }

    fn learned_content(&self, question: &str) -> Option<LearnedContent> {
        let learning = self.learning.as_ref()?;
        match learning.learned_content(question, &self.learning_options) {
            Ok(content) if content.is_empty() => None,
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Feedback learning unavailable, using base prompt: {}", e);
                None
            }
        }
    }

    /// One loop iteration. Pushes an [`Attempt`] as soon as a query exists.
    async fn attempt(
        &mut self,
        question: &str,
        mode: &PromptMode,
        learned: Option<&LearnedContent>,
        attempt_no: u32,
        attempts: &mut Vec<Attempt>,
    ) -> Result<Success, AttemptError> {
        let prompt = self
            .generator
            .prompt(mode, &self.schema_text, question, learned);
        let deadline = self.config.attempt_timeout_secs;
        let query = with_deadline(deadline, self.generator.complete(&prompt)).await?;

        attempts.push(Attempt {
            attempt: attempt_no,
            query: Some(query.clone()),
            error: None,
        });

        validate(&query).map_err(AttemptError::Rejected)?;
        if self.config.enforce_sanitize {
            sanitize(&query).map_err(AttemptError::Unsafe)?;
        }

        let results = self.executor.execute(&mut self.db, &query)?;
        let formatted = format_results(&results.columns, &results.rows, self.config.format_max_rows);

        let summary = with_deadline(
            deadline,
            self.summarizer.summarize(question, &query, &formatted),
        )
        .await
        .map_err(|e| match e {
            AttemptError::Oracle(inner) => AttemptError::Summarization(inner),
            other => other,
        })?;

        Ok(Success {
            query,
            results,
            summary,
        })
    }
}

/// Apply the per-call deadline, if any, to a model call.
async fn with_deadline<T>(
    timeout_secs: Option<u64>,
    call: impl Future<Output = Result<T, LlmError>>,
) -> Result<T, AttemptError> {
    match timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), call).await {
            Ok(outcome) => Ok(outcome?),
            Err(_) => Err(AttemptError::Timeout(secs)),
        },
        None => Ok(call.await?),
    }
}

/// Store `err` on this iteration's attempt, creating a placeholder if the
/// failure came before a query.
fn record_failure(attempts: &mut Vec<Attempt>, attempt_no: u32, err: &AttemptError) {
    match attempts.last_mut() {
        Some(last) if last.attempt == attempt_no => last.error = Some(err.to_string()),
        _ => attempts.push(Attempt {
            attempt: attempt_no,
            query: None,
            error: Some(err.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::CellValue;
    use crate::feedback::FeedbackRepository;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Replies from a script; summary prompts always get a fixed answer.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
        summary: Result<String, ()>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| {
                            r.map(str::to_string)
                                .map_err(|e| LlmError::Connection(e.to_string()))
                        })
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
                summary: Ok("There are 7 employees.".to_string()),
            })
        }

        fn generation_prompts(&self) -> Vec<String> {
            self.prompts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| !p.starts_with("Given a SQL query and its results"))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Oracle for Scripted {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.starts_with("Given a SQL query and its results") {
                return self
                    .summary
                    .clone()
                    .map_err(|_| LlmError::Api("summary down".to_string()));
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("SELECT 1".to_string()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn chain(dir: &tempfile::TempDir, oracle: Arc<Scripted>) -> TextToSqlChain {
        let db = Database::open_or_seed(&dir.path().join("sample.db")).unwrap();
        TextToSqlChain::new(db, oracle, ChainConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![Ok("SELECT COUNT(*) FROM employees")]);
        let mut chain = chain(&dir, oracle.clone());

        let result = chain.run("How many employees are there?", &RunOptions::default()).await;
        assert!(result.is_success());
        assert!(result.error.is_none());
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.sql_query.as_deref(), Some("SELECT COUNT(*) FROM employees"));
        assert_eq!(result.results.unwrap().rows, vec![vec![CellValue::Integer(7)]]);
        assert_eq!(result.summary.as_deref(), Some("There are 7 employees."));
    }

    #[tokio::test]
    async fn test_exhaustion_uses_all_attempts() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![
            Ok("DROP TABLE employees"),
            Ok("DELETE FROM employees"),
            Ok("UPDATE employees SET salary = 0"),
        ]);
        let mut chain = chain(&dir, oracle.clone());

        let result = chain.run("Wipe it", &RunOptions::default()).await;
        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some(EXHAUSTED_MESSAGE));
        assert!(result.results.is_none() && result.summary.is_none());
        assert_eq!(result.attempts.len(), 3);
        for (i, attempt) in result.attempts.iter().enumerate() {
            assert_eq!(attempt.attempt, i as u32 + 1);
            assert_eq!(attempt.error.as_deref(), Some("Only SELECT queries are allowed"));
        }

        // data untouched
        let mut db = Database::new(&dir.path().join("sample.db"));
        let count = db.execute("SELECT COUNT(*) FROM employees").unwrap();
        assert_eq!(count.rows, vec![vec![CellValue::Integer(7)]]);
    }

    #[tokio::test]
    async fn test_repair_after_execution_error() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![
            Ok("SELECT * FROM employes"),
            Ok("SELECT COUNT(*) FROM employees"),
        ]);
        let mut chain = chain(&dir, oracle.clone());

        let result = chain.run("How many employees?", &RunOptions::default()).await;
        assert!(result.is_success());
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].error.as_deref(), Some("no such table: employes"));
        assert!(result.attempts[1].error.is_none());

        let prompts = oracle.generation_prompts();
        assert!(prompts[1].starts_with("The following SQL query has an error:"));
        assert!(prompts[1].contains("SQL Query: SELECT * FROM employes\nError: no such table: employes"));
    }

    #[tokio::test]
    async fn test_oracle_failure_creates_placeholder() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![Err("connection refused"), Ok("SELECT COUNT(*) FROM departments")]);
        let mut chain = chain(&dir, oracle.clone());

        let result = chain.run("How many departments?", &RunOptions::default()).await;
        assert!(result.is_success());
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].query, None);
        assert_eq!(
            result.attempts[0].error.as_deref(),
            Some("Connection error: connection refused")
        );

        // no query to repair, so the second prompt is a fresh generation
        let prompts = oracle.generation_prompts();
        assert!(prompts[1].starts_with("You are a SQL expert."));
    }

    #[tokio::test]
    async fn test_max_retries_override() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![Ok("DROP TABLE x"); 5]);
        let mut chain = chain(&dir, oracle.clone());

        let options = RunOptions {
            max_retries: Some(0),
            ..Default::default()
        };
        let result = chain.run("q", &options).await;
        assert_eq!(result.attempts.len(), 1);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_max_retries_at_type_limit() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![Ok("SELECT COUNT(*) FROM employees")]);
        let mut chain = chain(&dir, oracle.clone());

        let options = RunOptions {
            max_retries: Some(u32::MAX),
            ..Default::default()
        };
        let result = chain.run("How many employees are there?", &options).await;
        assert!(result.is_success());
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].attempt, 1);
    }

    #[tokio::test]
    async fn test_summarization_failure_is_retried() {
        let dir = tempdir().unwrap();
        let oracle = Arc::new(Scripted {
            summary: Err(()),
            ..Arc::into_inner(Scripted::new(vec![Ok("SELECT 1")])).unwrap()
        });
        let mut chain = chain(&dir, oracle.clone());

        let result = chain.run("One?", &RunOptions::default()).await;
        assert!(!result.is_success());
        assert!(result.results.is_none());
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(
            result.attempts[0].error.as_deref(),
            Some("Summarization failed: API error: summary down")
        );
    }

    #[tokio::test]
    async fn test_sanitize_enforced_when_enabled() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![
            Ok("SELECT 1; DROP TABLE employees"),
            Ok("SELECT COUNT(*) FROM employees"),
        ]);
        let db = Database::open_or_seed(&dir.path().join("sample.db")).unwrap();
        let config = ChainConfig {
            enforce_sanitize: true,
            ..Default::default()
        };
        let mut chain = TextToSqlChain::new(db, oracle, config).unwrap();

        let result = chain.run("How many employees?", &RunOptions::default()).await;
        assert!(result.is_success());
        assert_eq!(
            result.attempts[0].error.as_deref(),
            Some("Dangerous keyword detected: DROP")
        );
    }

    #[tokio::test]
    async fn test_feedback_learning_enhances_prompt() {
        let dir = tempdir().unwrap();
        let repo = FeedbackRepository::new(&dir.path().join("feedback.db")).unwrap();
        repo.add_feedback("List all departments", "SELECT * FROM departments", 5, None)
            .unwrap();

        let oracle = Scripted::new(vec![Ok("SELECT name FROM departments")]);
        let mut chain =
            chain(&dir, oracle.clone()).with_feedback(FeedbackLearning::new(repo), LearningOptions::default());

        chain.run("Show departments", &RunOptions::default()).await;
        let off = RunOptions {
            use_feedback_learning: false,
            ..Default::default()
        };
        chain.run("Show departments", &off).await;

        let prompts = oracle.generation_prompts();
        assert!(prompts[0].contains("SQL: SELECT * FROM departments"));
        assert!(prompts[0].contains("Now generate SQL for this question:"));
        assert!(!prompts[1].contains("Now generate SQL for this question:"));
    }

    #[tokio::test]
    async fn test_close_and_rerun() {
        let dir = tempdir().unwrap();
        let oracle = Scripted::new(vec![Ok("SELECT 1"), Ok("SELECT 2")]);
        let mut chain = chain(&dir, oracle);
        assert!(chain.run("one", &RunOptions::default()).await.is_success());
        chain.close();
        chain.close();
        assert!(chain.run("two", &RunOptions::default()).await.is_success());
        assert!(chain.schema().table("employees").is_some());
        assert!(chain.schema_text().contains("Table: projects"));
    }

    struct Stalled;

    #[async_trait]
    impl Oracle for Stalled {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("SELECT 1".to_string())
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_attempt_deadline() {
        let dir = tempdir().unwrap();
        let db = Database::open_or_seed(&dir.path().join("sample.db")).unwrap();
        let config = ChainConfig {
            attempt_timeout_secs: Some(1),
            ..Default::default()
        };
        let mut chain = TextToSqlChain::new(db, Arc::new(Stalled), config).unwrap();

        let options = RunOptions {
            max_retries: Some(0),
            ..Default::default()
        };
        let result = chain.run("q", &options).await;
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].query, None);
        assert_eq!(
            result.attempts[0].error.as_deref(),
            Some("LLM call timed out after 1s")
        );
    }
}
