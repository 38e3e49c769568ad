use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed trace record at line {line}: {reason}")]
    Trace { line: u64, reason: String },

    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("Execution error: {0}")]
    Exec(String),

    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cannot parse statement: {0}")]
    Parse(String),

    #[error("Session {0} is closed")]
    SessionClosed(i64),

    #[error("Session task failed: {0}")]
    Task(String),

    #[error("Replay log error: {0}")]
    Log(String),
}

pub type Result<T> = std::result::Result<T, ReplayError>;
