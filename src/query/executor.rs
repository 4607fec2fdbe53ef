//! Query execution and result formatting.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::database::{CellValue, Database, DatabaseError};

/// Default number of rows rendered by [`format_results`].
pub const DEFAULT_MAX_ROWS: usize = 10;

/// A statement the store refused to run. The message is the store's own text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutionError(pub String);

impl From<DatabaseError> for ExecutionError {
    fn from(err: DatabaseError) -> Self {
        ExecutionError(err.to_string())
    }
}

/// Runs queries against a [`Database`], turning every failure into a value.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        db: &mut Database,
        query: &str,
    ) -> Result<crate::database::ResultSet, ExecutionError> {
        let result = db.execute(query)?;
        debug!(
            columns = result.columns.len(),
            rows = result.rows.len(),
            "Query executed"
        );
        Ok(result)
    }
}

/// Render rows as plain text for the summarizer.
pub fn format_results(columns: &[String], rows: &[Vec<CellValue>], max_rows: usize) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }

    let header = columns.join(" | ");
    let mut text = format!("Found {} result(s):\n\n", rows.len());
    text.push_str(&header);
    text.push('\n');
    text.push_str(&"-".repeat(header.chars().count()));
    text.push('\n');

    for row in rows.iter().take(max_rows) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        text.push_str(&line.join(" | "));
        text.push('\n');
    }

    if rows.len() > max_rows {
        text.push_str(&format!("\n... and {} more rows", rows.len() - max_rows));
    }

    text
}

/// Rows as column-keyed JSON objects.
pub fn format_results_as_maps(columns: &[String], rows: &[Vec<CellValue>]) -> Vec<Map<String, Value>> {
    rows.iter()
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row.iter().map(cell_to_json))
                .collect()
        })
        .collect()
}

fn cell_to_json(cell: &CellValue) -> Value {
    serde_json::to_value(cell).unwrap_or(Value::Null)
}
