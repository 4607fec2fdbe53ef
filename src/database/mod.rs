//! Relational store access: connection lifecycle, query execution and
//! schema introspection over SQLite.

mod sample;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use sample::seed_sample;
pub use schema::{ColumnInfo, SchemaDescription, TableSchema};

/// Errors from the relational store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single result cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Tabular query output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A SQLite database that can be connected and disconnected repeatedly.
///
/// The connection is opened lazily by [`Database::execute`] and
/// [`Database::introspect_schema`] when not already connected.
pub struct Database {
    path: PathBuf,
    conn: Option<Connection>,
}

impl Database {
    /// Create a handle for the database at `path` without connecting.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            conn: None,
        }
    }

    /// Create a handle, seeding the sample database first if the file is missing.
    pub fn open_or_seed(path: &Path) -> Result<Self, DatabaseError> {
        if !path.exists() {
            info!("Database {} not found, creating sample", path.display());
            seed_sample(path)?;
        }
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the connection if not already open.
    pub fn connect(&mut self) -> Result<&Connection, DatabaseError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                debug!("Connecting to {}", self.path.display());
                let conn = Connection::open(&self.path)?;
                conn.busy_timeout(Duration::from_secs(5))?;
                conn
            }
        };
        Ok(&*self.conn.insert(conn))
    }

    /// Close the connection. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            debug!("Disconnecting from {}", self.path.display());
            if let Err((_, e)) = conn.close() {
                tracing::warn!("Error closing {}: {}", self.path.display(), e);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Run a statement and collect its column names and rows.
    ///
    /// Statements without result columns are executed and return an empty set.
    pub fn execute(&mut self, query: &str) -> Result<ResultSet, DatabaseError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(query)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();

        if columns.is_empty() {
            stmt.execute([])?;
            return Ok(ResultSet::default());
        }

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(CellValue::from(row.get_ref(i)?));
            }
            rows.push(values);
        }

        Ok(ResultSet { columns, rows })
    }

    /// Introspect table and column metadata.
    pub fn introspect_schema(&mut self) -> Result<SchemaDescription, DatabaseError> {
        let conn = self.connect()?;
        Ok(SchemaDescription::introspect(conn)?)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.disconnect();
    }
}
