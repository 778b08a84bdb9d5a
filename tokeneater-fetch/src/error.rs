//! Fetch error types.

use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for remote usage fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server rejected the credential (401/403).
    #[error("Authentication failed (HTTP {status})")]
    AuthFailure {
        /// Status code returned by the server.
        status: u16,
    },

    /// Unexpected non-2xx status.
    #[error("HTTP error {0}")]
    Http(u16),

    /// Transport failure (DNS, TLS, timeout, connection reset).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Payload had no decodable bucket.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Proxy settings could not be applied.
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Returns true if the credential was rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, FetchError::AuthFailure { .. })
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Request(e) => FetchError::Network(e),
            HttpError::Proxy(msg) => FetchError::Proxy(msg),
            HttpError::InvalidUrl(msg) => FetchError::InvalidUrl(msg),
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Proxy could not be configured.
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for secure store reads.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// The store needs interactive authorization, or did not answer in time.
    #[error("Secure store is locked")]
    Locked,

    /// Access denied to the store.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Keychain unavailable on this platform.
    #[error("Keychain unavailable: {0}")]
    Unavailable(String),

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl KeychainError {
    /// Returns true if a user prompt would unblock the read.
    pub fn needs_interaction(&self) -> bool {
        matches!(self, KeychainError::Locked | KeychainError::AccessDenied)
    }
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::Ambiguous(_) => {
                KeychainError::Other("Ambiguous credential entry".to_string())
            }
            _ => KeychainError::Other(err.to_string()),
        }
    }
}
