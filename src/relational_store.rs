//! Relational Store
//!
//! In-memory SQLite projection of the session's datasets. A store is built
//! from the current snapshot for one question cycle and dropped afterwards;
//! nothing is persisted.

use crate::dataset::{TabularDataset, Value};
use crate::error::{DataTalkError, Result};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub name: String,
    pub rows: usize,
}

/// Outcome of loading a dataset snapshot. Failed tables are absent from the store.
#[derive(Debug, Default)]
pub struct MaterializationReport {
    pub loaded: Vec<LoadedTable>,
    pub failures: Vec<DataTalkError>,
}

impl MaterializationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the tables that could not be loaded.
    pub fn failed_tables(&self) -> Vec<String> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                DataTalkError::Materialization { table, .. } => Some(table.clone()),
                _ => None,
            })
            .collect()
    }
}

pub struct RelationalStore {
    conn: Connection,
}

impl RelationalStore {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DataTalkError::Materialization {
            table: "<store>".to_string(),
            message: format!("failed to open in-memory database: {}", e),
        })?;
        Ok(Self { conn })
    }

    /// Build a fresh store with one relation per dataset. Per-table failures are
    /// collected in the report; only failing to open the database is fatal.
    pub fn materialize(
        datasets: &BTreeMap<String, TabularDataset>,
    ) -> Result<(Self, MaterializationReport)> {
        let mut store = Self::open_in_memory()?;
        let mut report = MaterializationReport::default();

        for (name, dataset) in datasets {
            match store.load_table(name, dataset) {
                Ok(rows) => report.loaded.push(LoadedTable {
                    name: name.clone(),
                    rows,
                }),
                Err(e) => {
                    warn!("Skipping table {}: {}", name, e);
                    report.failures.push(e);
                }
            }
        }

        info!(
            "Materialized {} of {} tables",
            report.loaded.len(),
            datasets.len()
        );
        Ok((store, report))
    }

    /// Create or replace relation `name` with the dataset's rows. On failure the
    /// relation is removed entirely.
    pub fn load_table(&mut self, name: &str, dataset: &TabularDataset) -> Result<usize> {
        let failure = |message: String| DataTalkError::Materialization {
            table: name.to_string(),
            message,
        };

        if name.trim().is_empty() {
            return Err(failure("table name is empty".to_string()));
        }
        if dataset.column_count() == 0 {
            return Err(failure("dataset has no columns".to_string()));
        }

        let tx = self.conn.transaction().map_err(|e| failure(e.to_string()))?;
        match write_table(&tx, name, dataset) {
            Ok(rows) => {
                tx.commit().map_err(|e| failure(e.to_string()))?;
                Ok(rows)
            }
            Err(e) => {
                drop(tx);
                // the rollback restores any earlier relation; a failed load must leave none
                let drop_sql = format!("DROP TABLE IF EXISTS {}", quote_ident(name));
                let dropped = self.conn.execute(&drop_sql, []);
                if let Err(ref drop_err) = dropped {
                    warn!("Could not drop table {} after failed load: {}", name, drop_err);
                }
                Err(failure(failed_load_message(&e, dropped)))
            }
        }
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn write_table(tx: &Transaction<'_>, name: &str, dataset: &TabularDataset) -> rusqlite::Result<usize> {
    let table = quote_ident(name);
    tx.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;

    let column_defs = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| format!("{} {}", quote_ident(col), dataset.column_type(idx).sql_name()))
        .collect::<Vec<_>>()
        .join(", ");
    tx.execute(&format!("CREATE TABLE {} ({})", table, column_defs), [])?;

    let placeholders = vec!["?"; dataset.column_count()].join(", ");
    let mut insert = tx.prepare(&format!("INSERT INTO {} VALUES ({})", table, placeholders))?;
    for row in dataset.rows() {
        insert.execute(params_from_iter(row.iter()))?;
    }

    Ok(dataset.row_count())
}

/// Cause of a failed load, noting when the relation could not be removed
/// afterwards and may still be queryable.
fn failed_load_message(load_error: &rusqlite::Error, dropped: rusqlite::Result<usize>) -> String {
    match dropped {
        Ok(_) => load_error.to_string(),
        Err(drop_error) => format!(
            "{} (previous relation could not be dropped: {})",
            load_error, drop_error
        ),
    }
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
