//! Schema introspection and its canonical text rendering.

use rusqlite::Connection;
use serde::ser::{Serialize, Serializer};

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    pub nullable: bool,
    #[serde(rename = "primary_key")]
    pub is_primary_key: bool,
}

/// A table and its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Structure of a connected database, captured once per connection open.
///
/// Serializes as a `{table: [column, ...]}` mapping in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescription {
    tables: Vec<TableSchema>,
}

impl SchemaDescription {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// Read table and column metadata from a SQLite connection.
    pub fn introspect(conn: &Connection) -> rusqlite::Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let table_names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut tables = Vec::with_capacity(table_names.len());
        for table_name in table_names {
            let mut pragma = conn.prepare(&format!(
                "PRAGMA table_info(\"{}\")",
                table_name.replace('"', "\"\"")
            ))?;
            let columns = pragma
                .query_map([], |row| {
                    Ok(ColumnInfo {
                        name: row.get(1)?,
                        declared_type: row.get(2)?,
                        nullable: !row.get::<_, bool>(3)?,
                        is_primary_key: row.get::<_, i32>(5)? > 0,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            tables.push(TableSchema {
                name: table_name,
                columns,
            });
        }

        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Canonical text form consumed by every prompt.
    pub fn render(&self) -> String {
        let mut text = String::from("Database Schema:\n\n");
        for table in &self.tables {
            text.push_str(&format!("Table: {}\n", table.name));
            for col in &table.columns {
                let pk = if col.is_primary_key {
                    " (PRIMARY KEY)"
                } else {
                    ""
                };
                text.push_str(&format!("  - {} {}{}\n", col.name, col.declared_type, pk));
            }
            text.push('\n');
        }
        text
    }
}

impl Serialize for SchemaDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.tables.iter().map(|t| (&t.name, &t.columns)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE departments (id INTEGER PRIMARY KEY, name TEXT NOT NULL, budget REAL);
            CREATE TABLE employees (id INTEGER PRIMARY KEY, name TEXT NOT NULL, department_id INTEGER);
        "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_introspect_preserves_order() {
        let schema = SchemaDescription::introspect(&sample_conn()).unwrap();
        let names: Vec<_> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["departments", "employees"]);

        let departments = schema.table("departments").unwrap();
        assert_eq!(departments.columns.len(), 3);
        assert!(departments.columns[0].is_primary_key);
        assert!(!departments.columns[1].nullable);
        assert!(departments.columns[2].nullable);
        assert_eq!(departments.columns[2].declared_type, "REAL");
    }

    #[test]
    fn test_render() {
        let schema = SchemaDescription::introspect(&sample_conn()).unwrap();
        let text = schema.render();
        assert!(text.starts_with("Database Schema:\n\nTable: departments\n"));
        assert!(text.contains("  - id INTEGER (PRIMARY KEY)\n"));
        assert!(text.contains("  - budget REAL\n"));
        assert!(text.ends_with("  - department_id INTEGER\n\n"));
    }

    #[test]
    fn test_serialize_as_mapping() {
        let schema = SchemaDescription::introspect(&sample_conn()).unwrap();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["employees"][1]["name"], "name");
        assert_eq!(json["employees"][1]["type"], "TEXT");
        assert_eq!(json["employees"][1]["nullable"], false);
        assert_eq!(json["employees"][0]["primary_key"], true);
    }

    #[test]
    fn test_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = SchemaDescription::introspect(&conn).unwrap();
        assert!(schema.is_empty());
        assert_eq!(schema.render(), "Database Schema:\n\n");
    }
}
