//! End-to-end runs against the seeded sample database with a stub model.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::tempdir;

use asksql::chain::{ChainConfig, RunOptions, TextToSqlChain};
use asksql::database::{CellValue, Database};
use asksql::feedback::{FeedbackLearning, FeedbackRepository, LearningOptions};
use asksql::llm::{LlmError, Oracle};

/// Answers by matching phrases in the prompt's final question line.
struct Stub {
    prompts: Mutex<Vec<String>>,
}

impl Stub {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for Stub {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.starts_with("Given a SQL query and its results") {
            return Ok("Here is your answer.".to_string());
        }
        let question = prompt
            .lines()
            .rev()
            .find_map(|l| l.strip_prefix("Question: "))
            .unwrap_or_default();
        let sql = if question.contains("How many employees") {
            "```sql\nSELECT COUNT(*) FROM employees;\n```"
        } else if question.contains("active projects") {
            "SELECT name FROM projects WHERE status = 'active' ORDER BY name"
        } else if question.contains("Delete") {
            "DELETE FROM employees"
        } else {
            "SELECT * FROM no_such_table"
        };
        Ok(sql.to_string())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn open_chain(dir: &tempfile::TempDir, oracle: Arc<Stub>) -> TextToSqlChain {
    let db = Database::open_or_seed(&dir.path().join("sample_database.db")).unwrap();
    TextToSqlChain::new(db, oracle, ChainConfig::default()).unwrap()
}

#[tokio::test]
async fn test_count_employees() {
    let dir = tempdir().unwrap();
    let mut chain = open_chain(&dir, Stub::new());

    let result = chain
        .run("How many employees are there?", &RunOptions::default())
        .await;

    assert!(result.is_success());
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.sql_query.as_deref(), Some("SELECT COUNT(*) FROM employees;"));
    let results = result.results.unwrap();
    assert_eq!(results.rows, vec![vec![CellValue::Integer(7)]]);
    assert_eq!(result.summary.as_deref(), Some("Here is your answer."));
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_active_projects() {
    let dir = tempdir().unwrap();
    let mut chain = open_chain(&dir, Stub::new());

    let result = chain
        .run("Which active projects are there?", &RunOptions::default())
        .await;

    let names: Vec<CellValue> = result
        .results
        .unwrap()
        .rows
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(
        names,
        vec![
            CellValue::Text("Employee Training".to_string()),
            CellValue::Text("Mobile App".to_string()),
            CellValue::Text("Sales Campaign".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_writes_never_execute() {
    let dir = tempdir().unwrap();
    let mut chain = open_chain(&dir, Stub::new());

    let result = chain.run("Delete everyone", &RunOptions::default()).await;
    assert!(!result.is_success());
    assert_eq!(result.attempts.len(), 3);
    assert!(result
        .attempts
        .iter()
        .all(|a| a.error.as_deref() == Some("Only SELECT queries are allowed")));

    let count = chain
        .run("How many employees are there?", &RunOptions::default())
        .await;
    assert_eq!(count.results.unwrap().rows, vec![vec![CellValue::Integer(7)]]);
}

#[tokio::test]
async fn test_run_result_json() {
    let dir = tempdir().unwrap();
    let mut chain = open_chain(&dir, Stub::new());

    let result = chain
        .run("How many employees are there?", &RunOptions::default())
        .await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["results"]["rows"], serde_json::json!([[7]]));
    assert_eq!(json["attempts"][0]["attempt"], 1);
    assert!(json["error"].is_null());
}

#[tokio::test]
async fn test_rated_query_reaches_next_prompt() {
    let dir = tempdir().unwrap();
    let repo = FeedbackRepository::new(&dir.path().join("feedback.db")).unwrap();
    repo.add_feedback(
        "How many employees work in Engineering?",
        "SELECT COUNT(*) FROM employees WHERE department = 'Engineering'",
        5,
        None,
    )
    .unwrap();

    let oracle = Stub::new();
    let mut chain = open_chain(&dir, oracle.clone())
        .with_feedback(FeedbackLearning::new(repo.clone()), LearningOptions::default());

    let result = chain
        .run("How many employees are there?", &RunOptions::default())
        .await;
    assert!(result.is_success());
    assert!(oracle.prompts()[0]
        .contains("SELECT COUNT(*) FROM employees WHERE department = 'Engineering'"));

    let plain = RunOptions {
        use_feedback_learning: false,
        ..Default::default()
    };
    chain.run("How many employees are there?", &plain).await;
    let last_generation = oracle
        .prompts()
        .into_iter()
        .filter(|p| !p.starts_with("Given a SQL query"))
        .last()
        .unwrap();
    assert!(!last_generation.contains("department = 'Engineering'"));
}

#[tokio::test]
async fn test_concurrent_feedback_writes() {
    let dir = tempdir().unwrap();
    let repo = FeedbackRepository::new(&dir.path().join("feedback.db")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = repo.clone();
            tokio::task::spawn_blocking(move || {
                repo.add_feedback(
                    &format!("Question {}", i),
                    "SELECT 1",
                    (i % 5) + 1,
                    None,
                )
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(repo.stats().unwrap().total_feedback, 8);
}
