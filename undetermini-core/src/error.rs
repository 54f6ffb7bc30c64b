//! Error types for the Undetermini benchmarking core.
//!
//! Uses `thiserror` for public API error types. Configuration and storage
//! failures surface to the caller; candidate failures are captured per run as
//! [`ExecutionError`] and never abort a batch.

use std::path::PathBuf;

/// Top-level error type for the Undetermini core library.
#[derive(Debug, thiserror::Error)]
pub enum UndeterminiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Fatal configuration mistakes, raised at registration or run start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Implementation name already exists: {name}")]
    DuplicateImplementation { name: String },

    #[error("need either an expected output or an accuracy function")]
    MissingAccuracySpec,

    #[error("an expected output and an accuracy function were both supplied")]
    ConflictingAccuracySpec,

    #[error("Can not add an existing LLM model info: {name}")]
    DuplicateModel { name: String },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },
}

/// Failures reading or writing run records.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to load result store {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Failed to write result store {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Result store {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// A failure raised by a candidate implementation during one run.
///
/// Only the message survives persistence, so two errors compare equal when
/// their messages do.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Wrap any displayable error, keeping only its rendered message.
    pub fn from_display(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for ExecutionError {
    fn from(err: serde_json::Error) -> Self {
        Self::from_display(err)
    }
}

/// A type alias for results using the top-level `UndeterminiError`.
pub type Result<T> = std::result::Result<T, UndeterminiError>;
