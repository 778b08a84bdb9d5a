//! Read access to the system keychain.
//!
//! The entries read here are owned by another program. This module never
//! writes or deletes them.
//!
//! - macOS: Keychain Services
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! ## Silent reads
//!
//! A keychain read can block on a system authorization prompt. Background
//! callers use [`KeychainApi::get_silent`], which runs the read on a blocking
//! thread and gives up after a short timeout, reporting
//! [`KeychainError::Locked`] instead of waiting for the user.

use std::time::Duration;

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use crate::error::KeychainError;

/// Default bound on a silent read.
pub const DEFAULT_SILENT_TIMEOUT: Duration = Duration::from_millis(1500);

// ============================================================================
// Keychain API Trait
// ============================================================================

/// Read-only API for secure credential storage.
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Reads a secret, allowing the platform to prompt the user.
    ///
    /// # Returns
    /// * `Ok(Some(secret))` - Secret found
    /// * `Ok(None)` - No entry
    /// * `Err(e)` - Error accessing keychain
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError>;

    /// Reads a secret without ever waiting on a user prompt.
    ///
    /// Returns `Err(KeychainError::Locked)` when the store would need one.
    async fn get_silent(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, KeychainError>;

    /// Checks if an entry exists without waiting on a prompt.
    ///
    /// A locked entry counts as existing.
    async fn exists(&self, service: &str, account: &str) -> bool {
        matches!(
            self.get_silent(service, account).await,
            Ok(Some(_)) | Err(KeychainError::Locked | KeychainError::AccessDenied)
        )
    }
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// Implementation backed by the `keyring` crate.
#[derive(Debug, Clone)]
pub struct SystemKeychain {
    silent_timeout: Duration,
}

impl SystemKeychain {
    /// Creates a system keychain with the default silent timeout.
    pub fn new() -> Self {
        Self {
            silent_timeout: DEFAULT_SILENT_TIMEOUT,
        }
    }

    /// Overrides how long a silent read may take.
    #[must_use]
    pub fn with_silent_timeout(mut self, timeout: Duration) -> Self {
        self.silent_timeout = timeout;
        self
    }

    fn read_blocking(service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let entry =
            Entry::new(service, account).map_err(|e| KeychainError::Platform(e.to_string()))?;

        match entry.get_password() {
            Ok(secret) if secret.is_empty() => Ok(None),
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let service_owned = service.to_string();
        let account_owned = account.to_string();
        tokio::task::spawn_blocking(move || Self::read_blocking(&service_owned, &account_owned))
            .await
            .map_err(|e| KeychainError::Other(format!("keychain task failed: {e}")))?
    }
}

impl Default for SystemKeychain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeychainApi for SystemKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %service, account = %account, "Reading keychain entry");

        let result = Self::read(service, account).await;
        if let Err(ref e) = result {
            warn!(service = %service, account = %account, error = %e, "Keychain read failed");
        }
        result
    }

    async fn get_silent(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, KeychainError> {
        debug!(service = %service, account = %account, "Reading keychain entry silently");

        match tokio::time::timeout(self.silent_timeout, Self::read(service, account)).await {
            Ok(Err(KeychainError::AccessDenied)) => Err(KeychainError::Locked),
            Ok(result) => result,
            Err(_) => {
                debug!(
                    service = %service,
                    timeout_ms = self.silent_timeout.as_millis(),
                    "Silent keychain read timed out"
                );
                Err(KeychainError::Locked)
            }
        }
    }
}
