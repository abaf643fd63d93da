use std::path::PathBuf;

use thiserror::Error;

/// Every failure the chromatogram pipeline can surface to its caller.
#[derive(Error, Debug)]
pub enum ChromError {
    /// Malformed or missing input structure.
    #[error("format error: {0}")]
    Format(String),

    #[error("trace contains no samples")]
    EmptyTrace,

    /// Invalid configuration value supplied by the caller.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// A peak used with a chromatogram it does not belong to.
    #[error("invalid peak: {0}")]
    InvalidPeak(String),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ChromError {
    pub fn format(message: impl Into<String>) -> Self {
        ChromError::Format(message.into())
    }

    /// Format error pinned to a 1-based line of the input.
    pub fn format_at(line: usize, message: impl std::fmt::Display) -> Self {
        ChromError::Format(format!("line {line}: {message}"))
    }

    pub fn parameter(message: impl Into<String>) -> Self {
        ChromError::Parameter(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ChromError>;
