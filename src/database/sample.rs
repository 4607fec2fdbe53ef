//! Sample company database used when no database exists yet.

use std::fs;
use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

const SAMPLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    department_id INTEGER,
    salary REAL,
    hire_date TEXT
);

CREATE TABLE IF NOT EXISTS departments (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    budget REAL
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    department_id INTEGER,
    start_date TEXT,
    end_date TEXT,
    status TEXT
);
"#;

const SAMPLE_DATA: &str = r#"
INSERT INTO departments VALUES (1, 'Engineering', 500000);
INSERT INTO departments VALUES (2, 'Sales', 300000);
INSERT INTO departments VALUES (3, 'HR', 200000);
INSERT INTO departments VALUES (4, 'Marketing', 250000);

INSERT INTO employees VALUES (1, 'John Doe', 1, 75000, '2020-01-15');
INSERT INTO employees VALUES (2, 'Jane Smith', 1, 85000, '2019-03-20');
INSERT INTO employees VALUES (3, 'Bob Johnson', 2, 65000, '2021-06-10');
INSERT INTO employees VALUES (4, 'Alice Williams', 3, 60000, '2020-11-05');
INSERT INTO employees VALUES (5, 'Charlie Brown', 1, 95000, '2018-07-12');
INSERT INTO employees VALUES (6, 'Diana Prince', 2, 70000, '2021-02-18');
INSERT INTO employees VALUES (7, 'Eve Davis', 4, 68000, '2020-09-22');

INSERT INTO projects VALUES (1, 'Website Redesign', 1, '2023-01-01', '2023-06-30', 'completed');
INSERT INTO projects VALUES (2, 'Sales Campaign', 2, '2023-03-01', '2023-12-31', 'active');
INSERT INTO projects VALUES (3, 'Employee Training', 3, '2023-05-15', '2023-11-30', 'active');
INSERT INTO projects VALUES (4, 'Mobile App', 1, '2024-01-01', '2024-12-31', 'active');
"#;

/// Create the sample database (employees, departments, projects) at `path`.
///
/// Parent directories are created as needed. The data is inserted in a single
/// transaction.
pub fn seed_sample(path: &Path) -> Result<(), DatabaseError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;
    tx.execute_batch(SAMPLE_SCHEMA)?;
    tx.execute_batch(SAMPLE_DATA)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_seed_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.db");
        seed_sample(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count = |table: &str| -> i64 {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
        };
        assert_eq!(count("employees"), 7);
        assert_eq!(count("departments"), 4);
        assert_eq!(count("projects"), 4);
    }
}
