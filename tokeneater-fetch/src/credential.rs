//! Credential sources.
//!
//! The bearer token is written by the Claude CLI to two places:
//!
//! 1. **File**: `~/.claude/.credentials.json`
//! 2. **Keychain**: service `Claude Code-credentials`
//!
//! Both hold the same document:
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000
//!   }
//! }
//! ```
//!
//! This crate only reads the token. Rotation is done by the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokeneater_core::Credential;
use tracing::{debug, instrument, warn};

use crate::error::KeychainError;
use crate::host::keychain::{KeychainApi, SystemKeychain};

// ============================================================================
// Constants
// ============================================================================

/// Keychain service written by the Claude CLI.
pub const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

/// Fallback keychain account (older CLI versions).
pub const KEYCHAIN_FALLBACK_ACCOUNT: &str = "";

// ============================================================================
// Credential Source Trait
// ============================================================================

/// Read-only access to an externally managed credential.
///
/// Both reads are side-effect free on failure. `Ok(None)` means no
/// credential exists; `Err(KeychainError::Locked)` means one may exist but
/// could not be read without user interaction.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Reads the credential, allowing an OS authorization prompt.
    async fn read_interactive(&self) -> Result<Option<Credential>, KeychainError>;

    /// Reads the credential without ever blocking on a prompt.
    async fn read_silent(&self) -> Result<Option<Credential>, KeychainError>;

    /// Cheap existence check that never returns secret material.
    async fn exists(&self) -> bool;
}

// ============================================================================
// Credentials Document
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    claude_ai_oauth: Option<OAuthData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthData {
    access_token: String,
}

/// Extracts the access token from a credentials document.
///
/// Accepts the full document, the bare `claudeAiOauth` object, or a raw
/// token string. Empty tokens read as absent.
fn parse_token(raw: &str) -> Option<Credential> {
    let trimmed = raw.trim();

    let token = if trimmed.starts_with('{') {
        if let Ok(file) = serde_json::from_str::<CredentialsFile>(trimmed)
            && let Some(oauth) = file.claude_ai_oauth
        {
            oauth.access_token
        } else if let Ok(oauth) = serde_json::from_str::<OAuthData>(trimmed) {
            oauth.access_token
        } else {
            warn!("Credentials document has no access token");
            return None;
        }
    } else {
        trimmed.to_string()
    };

    if token.is_empty() {
        None
    } else {
        Some(Credential::token(token))
    }
}

/// Returns the default credentials file path.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join(".credentials.json"))
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

// ============================================================================
// Claude Credential Source
// ============================================================================

/// Production source reading the Claude CLI's credential file and keychain.
#[derive(Clone)]
pub struct ClaudeCredentialSource {
    credentials_path: Option<PathBuf>,
    keychain: Arc<dyn KeychainApi>,
    accounts: Vec<String>,
}

impl ClaudeCredentialSource {
    /// Creates a source with the default file path and the system keychain.
    pub fn new() -> Self {
        let user = current_user();
        let mut accounts = Vec::with_capacity(2);
        if !user.is_empty() {
            accounts.push(user);
        }
        accounts.push(KEYCHAIN_FALLBACK_ACCOUNT.to_string());

        Self {
            credentials_path: default_credentials_path(),
            keychain: Arc::new(SystemKeychain::new()),
            accounts,
        }
    }

    /// Overrides the credentials file location. `None` disables the file.
    #[must_use]
    pub fn with_credentials_path(mut self, path: Option<PathBuf>) -> Self {
        self.credentials_path = path;
        self
    }

    /// Replaces the keychain backend.
    #[must_use]
    pub fn with_keychain(mut self, keychain: Arc<dyn KeychainApi>) -> Self {
        self.keychain = keychain;
        self
    }

    /// Replaces the keychain accounts tried, in order.
    #[must_use]
    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }

    async fn read_file(&self) -> Option<Credential> {
        let path = self.credentials_path.as_ref()?;

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                debug!(path = %path.display(), "Read credentials file");
                parse_token(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read credentials file");
                None
            }
        }
    }

    async fn read_keychain(&self, silent: bool) -> Result<Option<Credential>, KeychainError> {
        let mut blocked = None;

        for account in &self.accounts {
            let result = if silent {
                self.keychain.get_silent(KEYCHAIN_SERVICE, account).await
            } else {
                self.keychain.get(KEYCHAIN_SERVICE, account).await
            };

            match result {
                Ok(Some(secret)) => {
                    if let Some(credential) = parse_token(&secret) {
                        debug!(account = %account, "Found credential in keychain");
                        return Ok(Some(credential));
                    }
                }
                Ok(None) => {}
                Err(e) if e.needs_interaction() => {
                    debug!(account = %account, "Keychain entry needs authorization");
                    blocked = Some(KeychainError::Locked);
                }
                Err(e) => {
                    warn!(account = %account, error = %e, "Keychain read failed");
                }
            }
        }

        match blocked {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

impl Default for ClaudeCredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClaudeCredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeCredentialSource")
            .field("credentials_path", &self.credentials_path)
            .field("accounts", &self.accounts)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialSource for ClaudeCredentialSource {
    #[instrument(skip(self))]
    async fn read_interactive(&self) -> Result<Option<Credential>, KeychainError> {
        match self.read_keychain(false).await {
            Ok(Some(credential)) => Ok(Some(credential)),
            Ok(None) => Ok(self.read_file().await),
            Err(e) => match self.read_file().await {
                Some(credential) => Ok(Some(credential)),
                None => Err(e),
            },
        }
    }

    #[instrument(skip(self))]
    async fn read_silent(&self) -> Result<Option<Credential>, KeychainError> {
        if let Some(credential) = self.read_file().await {
            return Ok(Some(credential));
        }
        self.read_keychain(true).await
    }

    async fn exists(&self) -> bool {
        if let Some(path) = &self.credentials_path
            && tokio::fs::try_exists(path).await.unwrap_or(false)
        {
            return true;
        }

        for account in &self.accounts {
            if self.keychain.exists(KEYCHAIN_SERVICE, account).await {
                return true;
            }
        }
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
