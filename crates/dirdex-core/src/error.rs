//! Index error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Invalid extension passed at construction
    #[error("Invalid extension {0:?}: expected a bare suffix without leading dot or separators")]
    InvalidExtension(String),

    /// Path not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for IndexError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for IndexError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}
