//! Error types for pipetest

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the pipetest Error
pub type Result<T> = std::result::Result<T, Error>;

/// pipetest error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Fixture not found: {}", .path.display())]
    FixtureNotFound { path: PathBuf },

    #[error("Invalid fixture name '{name}': {reason}")]
    InvalidFixtureName { name: String, reason: String },

    #[error("Invalid {format} data: {reason}")]
    InvalidDataFormat { format: String, reason: String },

    #[error(
        "Schema mismatch at row {row}: missing [{}], unexpected [{}]",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    SchemaMismatch {
        row: usize,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Unknown generator kind '{kind}' for field '{field}'")]
    UnknownGenerator { field: String, kind: String },

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("Scratch directory {} unavailable: {source}", .path.display())]
    ScratchDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for an `InvalidDataFormat` error
    pub fn invalid_format(format: impl Into<String>, reason: impl ToString) -> Self {
        Error::InvalidDataFormat {
            format: format.into(),
            reason: reason.to_string(),
        }
    }
}
