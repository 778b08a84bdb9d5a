//! Sync error types.

use serde::Serialize;
use thiserror::Error;
use tokeneater_fetch::{FetchError, KeychainError};
use tokeneater_store::StoreError;

/// Outcome of a failed sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No credential is stored and none could be read.
    #[error("No credential configured")]
    NoCredential,

    /// The secure store needs interactive authorization.
    #[error("Secure store is locked")]
    VaultLocked,

    /// The server rejected the credential.
    #[error("Token expired or rejected")]
    AuthFailure,

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected HTTP status.
    #[error("HTTP error {0}")]
    Http(u16),

    /// The response held no decodable bucket.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The shared state could not be written.
    #[error("Store error: {0}")]
    Store(String),

    /// The cycle was cancelled before its result was applied.
    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Returns true if the next poll may succeed without outside help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::VaultLocked
                | SyncError::Network(_)
                | SyncError::Http(_)
                | SyncError::MalformedResponse(_)
                | SyncError::Store(_)
        )
    }

    /// Returns true if the failure holds until the credential changes.
    pub fn is_sticky(&self) -> bool {
        matches!(self, SyncError::AuthFailure)
    }
}

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::AuthFailure { .. } => SyncError::AuthFailure,
            FetchError::Http(code) => SyncError::Http(code),
            FetchError::MalformedResponse(msg) => SyncError::MalformedResponse(msg),
            FetchError::Network(e) => SyncError::Network(e.to_string()),
            FetchError::Proxy(msg) | FetchError::InvalidUrl(msg) => SyncError::Network(msg),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<KeychainError> for SyncError {
    fn from(_: KeychainError) -> Self {
        SyncError::VaultLocked
    }
}

// ============================================================================
// Error State
// ============================================================================

/// Last sync outcome, as presented to users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "message")]
pub enum ErrorState {
    /// Last cycle succeeded, or nothing has run yet.
    #[default]
    None,
    /// No credential is available.
    NotConfigured,
    /// The credential was rejected.
    TokenExpired,
    /// The secure store needs unlocking.
    VaultLocked,
    /// Transient failure with a description.
    Network(String),
}

impl ErrorState {
    /// Returns true when there is nothing to report.
    pub fn is_none(&self) -> bool {
        matches!(self, ErrorState::None)
    }

    /// Short description for display.
    pub fn message(&self) -> Option<String> {
        match self {
            ErrorState::None => None,
            ErrorState::NotConfigured => Some("Not configured".to_string()),
            ErrorState::TokenExpired => Some("Token expired".to_string()),
            ErrorState::VaultLocked => Some("Keychain locked".to_string()),
            ErrorState::Network(msg) => Some(msg.clone()),
        }
    }
}

impl From<&SyncError> for ErrorState {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::NoCredential => ErrorState::NotConfigured,
            SyncError::VaultLocked => ErrorState::VaultLocked,
            SyncError::AuthFailure => ErrorState::TokenExpired,
            SyncError::Cancelled => ErrorState::None,
            other => ErrorState::Network(other.to_string()),
        }
    }
}
