use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataTalkError {
    #[error("Error generating SQL: {0}")]
    LlmCall(String),

    #[error("Error generating SQL: the model returned an empty response")]
    EmptyResponse,

    #[error("Unsafe query detected, blocked for safety.")]
    UnsafeQuery,

    #[error("SQL Execution Error: {0}")]
    EmptyQuery(String),

    #[error("SQL Execution Error: {0}")]
    Execution(String),

    #[error("Failed to load table '{table}': {message}")]
    Materialization { table: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fieldless tag of a [`DataTalkError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    LlmCall,
    EmptyResponse,
    UnsafeQuery,
    EmptyQuery,
    Execution,
    Materialization,
    Config,
    Dataset,
    Io,
}

impl DataTalkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataTalkError::LlmCall(_) => ErrorKind::LlmCall,
            DataTalkError::EmptyResponse => ErrorKind::EmptyResponse,
            DataTalkError::UnsafeQuery => ErrorKind::UnsafeQuery,
            DataTalkError::EmptyQuery(_) => ErrorKind::EmptyQuery,
            DataTalkError::Execution(_) => ErrorKind::Execution,
            DataTalkError::Materialization { .. } => ErrorKind::Materialization,
            DataTalkError::Config(_) => ErrorKind::Config,
            DataTalkError::Dataset(_) => ErrorKind::Dataset,
            DataTalkError::Io(_) | DataTalkError::Csv(_) | DataTalkError::Json(_) => ErrorKind::Io,
        }
    }
}

impl From<rusqlite::Error> for DataTalkError {
    fn from(err: rusqlite::Error) -> Self {
        DataTalkError::Execution(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataTalkError>;
