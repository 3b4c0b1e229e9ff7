//! Error taxonomy for simfit.

use std::path::PathBuf;

/// Errors produced while loading inputs, dispatching runs and scoring them.
#[derive(Debug, thiserror::Error)]
pub enum SimfitError {
    #[error("file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("result file for run {run_id} not found: {}", path.display())]
    MissingResultFile { run_id: u64, path: PathBuf },

    #[error("malformed record at {}:{line}: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("series length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("simulator exited with {} for run {run_id}", describe_code(*code))]
    ExternalProcess { run_id: u64, code: Option<i32> },

    #[error("simulator timed out after {limit_secs}s for run {run_id}")]
    Timeout { run_id: u64, limit_secs: u64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("target file has no data points: {}", path.display())]
    EmptyTarget { path: PathBuf },

    #[error("cannot score an empty series")]
    EmptySeries,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type for simfit operations.
pub type Result<T> = std::result::Result<T, SimfitError>;
