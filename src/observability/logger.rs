//! Query Logger
//!
//! One structured entry per question cycle, kept in a bounded in-memory
//! buffer and optionally appended to a JSONL file.

use crate::error::{DataTalkError, ErrorKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub query_id: Uuid,
    pub question: String,
    pub sql_generated: Option<String>,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub rows_returned: Option<usize>,
    pub chart_rendered: bool,
    pub execution_time_ms: u64,
}

impl QueryLogEntry {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            query_id: Uuid::new_v4(),
            question: question.into(),
            sql_generated: None,
            success: false,
            error_kind: None,
            error_message: None,
            rows_returned: None,
            chart_rendered: false,
            execution_time_ms: 0,
        }
    }

    pub fn with_sql(mut self, sql: Option<String>) -> Self {
        self.sql_generated = sql;
        self
    }

    pub fn with_error(mut self, error: &DataTalkError) -> Self {
        self.success = false;
        self.error_kind = Some(error.kind());
        self.error_message = Some(error.to_string());
        self
    }

    pub fn with_success(mut self, rows_returned: usize, chart_rendered: bool) -> Self {
        self.success = true;
        self.rows_returned = Some(rows_returned);
        self.chart_rendered = chart_rendered;
        self
    }

    pub fn with_elapsed(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }
}

pub struct QueryLogger {
    log_file: Option<PathBuf>,
    entries: Mutex<VecDeque<QueryLogEntry>>,
    max_in_memory: usize,
}

impl QueryLogger {
    pub fn new(log_file: Option<PathBuf>, max_in_memory: usize) -> Self {
        Self {
            log_file,
            entries: Mutex::new(VecDeque::new()),
            max_in_memory: max_in_memory.max(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<QueryLogEntry>> {
        // entries are plain data; a panic elsewhere leaves them usable
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn log(&self, entry: QueryLogEntry) -> Result<()> {
        {
            let mut entries = self.entries();
            entries.push_back(entry.clone());
            while entries.len() > self.max_in_memory {
                entries.pop_front();
            }
        }

        if let Some(ref log_file) = self.log_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            let json = serde_json::to_string(&entry)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> Vec<QueryLogEntry> {
        self.entries().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn export(&self) -> Result<String> {
        let entries: Vec<QueryLogEntry> = self.entries().iter().cloned().collect();
        let export = serde_json::json!({
            "query_logs": entries,
            "exported_at": Utc::now().to_rfc3339()
        });
        serde_json::to_string_pretty(&export).map_err(DataTalkError::from)
    }
}

impl Default for QueryLogger {
    fn default() -> Self {
        Self::new(None, 1000)
    }
}
