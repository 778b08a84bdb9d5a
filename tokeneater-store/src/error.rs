//! Store error types.

use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Legacy data could not be moved forward.
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Migration(_))
    }
}

impl From<tokeneater_core::CoreError> for StoreError {
    fn from(err: tokeneater_core::CoreError) -> Self {
        match err {
            tokeneater_core::CoreError::Serialization(e) => StoreError::Serialization(e),
            other => StoreError::Config(other.to_string()),
        }
    }
}
