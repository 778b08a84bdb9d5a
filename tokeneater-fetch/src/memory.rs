//! In-memory implementations for tests and embedding.
//!
//! - [`MemoryKeychain`] - scripted keychain entries with a lock switch
//! - [`MemoryCredentialSource`] - a credential that tests can rotate
//! - [`ScriptedUsageClient`] - per-token responses with call counting

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokeneater_core::{Credential, ProxyConfig, UsageSnapshot};

use crate::client::RemoteUsageClient;
use crate::credential::CredentialSource;
use crate::error::{FetchError, KeychainError};
use crate::host::keychain::KeychainApi;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Keychain
// ============================================================================

/// Keychain backed by a map. When locked, silent reads fail with `Locked`
/// while interactive reads still succeed.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    entries: HashMap<(String, String), String>,
    locked: bool,
}

impl MemoryKeychain {
    /// Creates an empty, unlocked keychain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    #[must_use]
    pub fn with_entry(mut self, service: &str, account: &str, secret: &str) -> Self {
        self.entries
            .insert((service.to_string(), account.to_string()), secret.to_string());
        self
    }

    /// Marks the keychain as needing interactive authorization.
    #[must_use]
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    fn lookup(&self, service: &str, account: &str) -> Option<String> {
        self.entries
            .get(&(service.to_string(), account.to_string()))
            .cloned()
    }
}

#[async_trait]
impl KeychainApi for MemoryKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        Ok(self.lookup(service, account))
    }

    async fn get_silent(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, KeychainError> {
        if self.locked {
            return Err(KeychainError::Locked);
        }
        Ok(self.lookup(service, account))
    }
}

// ============================================================================
// Credential Source
// ============================================================================

#[derive(Debug, Default)]
struct SourceState {
    credential: Option<Credential>,
    locked: bool,
}

/// Credential source whose value tests can change between calls.
#[derive(Debug, Default)]
pub struct MemoryCredentialSource {
    state: Mutex<SourceState>,
    silent_reads: AtomicUsize,
    interactive_reads: AtomicUsize,
}

impl MemoryCredentialSource {
    /// Creates a source with no credential.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source holding `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        let source = Self::new();
        source.set(Some(credential));
        source
    }

    /// Replaces the credential, as an external rotation would.
    pub fn set(&self, credential: Option<Credential>) {
        lock(&self.state).credential = credential;
    }

    /// Makes silent reads fail with `Locked`.
    pub fn set_locked(&self, locked: bool) {
        lock(&self.state).locked = locked;
    }

    /// Number of silent reads so far.
    pub fn silent_reads(&self) -> usize {
        self.silent_reads.load(Ordering::SeqCst)
    }

    /// Number of interactive reads so far.
    pub fn interactive_reads(&self) -> usize {
        self.interactive_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for MemoryCredentialSource {
    async fn read_interactive(&self) -> Result<Option<Credential>, KeychainError> {
        self.interactive_reads.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.state).credential.clone())
    }

    async fn read_silent(&self) -> Result<Option<Credential>, KeychainError> {
        self.silent_reads.fetch_add(1, Ordering::SeqCst);
        let state = lock(&self.state);
        if state.locked {
            return Err(KeychainError::Locked);
        }
        Ok(state.credential.clone())
    }

    async fn exists(&self) -> bool {
        let state = lock(&self.state);
        state.locked || state.credential.is_some()
    }
}

// ============================================================================
// Usage Client
// ============================================================================

/// A canned response.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return this snapshot.
    Snapshot(UsageSnapshot),
    /// Reject the credential with this status.
    AuthFailure(u16),
    /// Fail with a non-auth status.
    Http(u16),
    /// Succeed with an undecodable body.
    Malformed,
}

impl ScriptedResponse {
    fn to_result(&self) -> Result<UsageSnapshot, FetchError> {
        match self {
            ScriptedResponse::Snapshot(snapshot) => Ok(snapshot.clone()),
            ScriptedResponse::AuthFailure(status) => {
                Err(FetchError::AuthFailure { status: *status })
            }
            ScriptedResponse::Http(code) => Err(FetchError::Http(*code)),
            ScriptedResponse::Malformed => Err(FetchError::MalformedResponse(
                "no decodable usage bucket".to_string(),
            )),
        }
    }
}

/// Client answering per token, counting every call.
///
/// Tokens without a script get `AuthFailure(401)`.
#[derive(Debug, Default)]
pub struct ScriptedUsageClient {
    responses: Mutex<HashMap<String, ScriptedResponse>>,
    calls: Mutex<Vec<Credential>>,
    proxies: Mutex<Vec<Option<ProxyConfig>>>,
    delay: Option<Duration>,
}

impl ScriptedUsageClient {
    /// Creates a client with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response, to exercise cancellation.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Scripts the response for a credential.
    pub fn respond(&self, credential: &Credential, response: ScriptedResponse) {
        lock(&self.responses).insert(credential.expose().to_string(), response);
    }

    /// Total number of fetches.
    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of fetches made with `credential`.
    pub fn calls_for(&self, credential: &Credential) -> usize {
        lock(&self.calls).iter().filter(|c| *c == credential).count()
    }

    /// Proxy settings seen by each fetch, in order.
    pub fn proxies(&self) -> Vec<Option<ProxyConfig>> {
        lock(&self.proxies).clone()
    }
}

#[async_trait]
impl RemoteUsageClient for ScriptedUsageClient {
    async fn fetch(
        &self,
        credential: &Credential,
        proxy: Option<&ProxyConfig>,
    ) -> Result<UsageSnapshot, FetchError> {
        lock(&self.calls).push(credential.clone());
        lock(&self.proxies).push(proxy.cloned());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = lock(&self.responses)
            .get(credential.expose())
            .cloned()
            .unwrap_or(ScriptedResponse::AuthFailure(401));
        response.to_result()
    }
}
