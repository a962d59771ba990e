//! Query Executor
//!
//! Runs one read statement against a [`RelationalStore`] and returns the rows
//! as a dataset. Engine failures become `Execution` errors carrying SQLite's
//! message.

use crate::dataset::{TabularDataset, Value};
use crate::error::{DataTalkError, Result};
use crate::relational_store::RelationalStore;
use crate::sql_sanitizer;
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::types::ValueRef;
use std::time::Instant;
use tracing::info;

lazy_static! {
    static ref SQL_COMMENT: Regex =
        Regex::new(r"(?s)--[^\n]*|/\*.*?(?:\*/|$)").expect("comment pattern is valid");
}

/// True when `sql` holds nothing but comments, semicolons and whitespace,
/// which SQLite prepares to no statement at all.
fn is_blank_statement(sql: &str) -> bool {
    SQL_COMMENT
        .replace_all(sql, "")
        .trim_matches(|c: char| c.is_whitespace() || c == ';')
        .is_empty()
}

/// Execute `sql` and collect its result set. Zero rows is a valid result.
///
/// Sanitization is applied again here so callers that skip it still get
/// fence-free SQL. Only the first statement in the text is prepared, and it
/// must be read-only.
pub fn execute(sql: &str, store: &RelationalStore) -> Result<TabularDataset> {
    if sql.trim().is_empty() {
        return Err(DataTalkError::EmptyQuery(
            "No valid SQL query provided.".to_string(),
        ));
    }

    let sql = sql_sanitizer::clean(sql);
    if is_blank_statement(&sql) {
        return Err(DataTalkError::EmptyQuery(
            "Cleaned SQL query is empty.".to_string(),
        ));
    }

    let start = Instant::now();
    let conn = store.connection();
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| DataTalkError::Execution(e.to_string()))?;

    if !stmt.readonly() {
        return Err(DataTalkError::Execution(
            "only read-only statements can be executed".to_string(),
        ));
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt
        .query([])
        .map_err(|e| DataTalkError::Execution(e.to_string()))?;
    while let Some(row) = cursor
        .next()
        .map_err(|e| DataTalkError::Execution(e.to_string()))?
    {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            let value = row
                .get_ref(idx)
                .map_err(|e| DataTalkError::Execution(e.to_string()))?;
            values.push(from_sql(value));
        }
        rows.push(values);
    }

    let result = TabularDataset::new(columns, rows)?;
    info!(
        "Query returned {} rows x {} columns in {}ms",
        result.row_count(),
        result.column_count(),
        start.elapsed().as_millis()
    );
    Ok(result)
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(format!("[BLOB {} bytes]", bytes.len())),
    }
}
