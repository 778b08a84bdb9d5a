//! The sync engine.
//!
//! One refresh cycle reads the active credential, fetches a snapshot, writes
//! it to the shared store and evaluates alerts. A rejected credential gets
//! exactly one silent re-read; a credential known to be rejected is not sent
//! again until the credential source yields a different one.
//!
//! # Example
//!
//! ```ignore
//! let engine = SyncEngine::builder(credentials, client, shared)
//!     .settings(SettingsStore::load_default().await)
//!     .notifier(Arc::new(SystemNotifier))
//!     .build();
//!
//! match engine.refresh().await {
//!     Ok(state) => println!("fetched at {}", state.fetched_at),
//!     Err(e) if e.is_transient() => println!("will retry: {e}"),
//!     Err(e) => println!("needs attention: {e}"),
//! }
//! ```

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokeneater_core::{CachedState, Credential, PacingCalculator, PacingResult, ProxyConfig};
use tokeneater_fetch::{ConnectionTestResult, CredentialSource, ModelStatsReader, RemoteUsageClient};
use tokeneater_store::{
    LevelStore, MemoryLevelStore, SettingsStore, SharedStateStore, default_settings_path,
};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorState, SyncError};
use crate::notifications::{Alert, LogNotifier, NotificationEngine, Notifier};

// ============================================================================
// Views
// ============================================================================

/// Cached snapshot with its derived pacing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedUsage {
    /// Last good snapshot and when it was fetched.
    #[serde(flatten)]
    pub state: CachedState,
    /// Weekly pacing, recomputed at read time.
    pub pacing: Option<PacingResult>,
}

/// Credential known to be rejected. Kept in memory only.
#[derive(Debug, Default)]
struct FailureMemo {
    last_failed: Option<Credential>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    credentials: Arc<dyn CredentialSource>,
    client: Arc<dyn RemoteUsageClient>,
    shared: Arc<dyn SharedStateStore>,
    levels: Option<Arc<dyn LevelStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    settings: Option<SettingsStore>,
    stats: Option<ModelStatsReader>,
}

impl SyncEngineBuilder {
    /// Sets the store for last notified levels. Defaults to memory.
    #[must_use]
    pub fn levels(mut self, levels: Arc<dyn LevelStore>) -> Self {
        self.levels = Some(levels);
        self
    }

    /// Sets the alert sink. Defaults to [`LogNotifier`].
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the settings store. Defaults to settings at the default path.
    #[must_use]
    pub fn settings(mut self, settings: SettingsStore) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets where model token totals are read from.
    #[must_use]
    pub fn model_stats(mut self, reader: ModelStatsReader) -> Self {
        self.stats = Some(reader);
        self
    }

    /// Disables the model token totals.
    #[must_use]
    pub fn without_model_stats(mut self) -> Self {
        self.stats = None;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> SyncEngine {
        let (changes, _) = watch::channel(0);
        let levels: Arc<dyn LevelStore> = match self.levels {
            Some(levels) => levels,
            None => Arc::new(MemoryLevelStore::new()),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(LogNotifier),
        };

        SyncEngine {
            credentials: self.credentials,
            client: self.client,
            shared: self.shared,
            notifications: NotificationEngine::new(levels, notifier),
            settings: self
                .settings
                .unwrap_or_else(|| SettingsStore::new(default_settings_path())),
            stats: self.stats,
            memo: Mutex::new(FailureMemo::default()),
            error: StdMutex::new(ErrorState::None),
            changes,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Orchestrates fetch, cache, credential recovery and alerts.
///
/// Refresh cycles are serialized; concurrent callers wait for the running
/// cycle and then run their own.
pub struct SyncEngine {
    credentials: Arc<dyn CredentialSource>,
    client: Arc<dyn RemoteUsageClient>,
    shared: Arc<dyn SharedStateStore>,
    notifications: NotificationEngine,
    settings: SettingsStore,
    stats: Option<ModelStatsReader>,
    memo: Mutex<FailureMemo>,
    error: StdMutex<ErrorState>,
    changes: watch::Sender<u64>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("error", &self.error_state())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Starts a builder with the three required collaborators.
    pub fn builder(
        credentials: Arc<dyn CredentialSource>,
        client: Arc<dyn RemoteUsageClient>,
        shared: Arc<dyn SharedStateStore>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            credentials,
            client,
            shared,
            levels: None,
            notifier: None,
            settings: None,
            stats: Some(ModelStatsReader::new()),
        }
    }

    /// Settings used for proxy, thresholds and intervals.
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// The shared state store.
    pub fn shared(&self) -> &Arc<dyn SharedStateStore> {
        &self.shared
    }

    /// Last outcome as shown to users.
    pub fn error_state(&self) -> ErrorState {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver bumped after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Last cached snapshot with pacing computed for `now`.
    pub async fn cached(&self, now: DateTime<Utc>) -> Option<CachedUsage> {
        let state = self.shared.read().await?;
        let pacing = PacingCalculator::calculate(&state.snapshot, now);
        Some(CachedUsage { state, pacing })
    }

    fn set_error(&self, state: ErrorState) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn notify_changed(&self) {
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    async fn proxy(&self) -> Option<ProxyConfig> {
        self.settings.get().await.active_proxy().cloned()
    }

    async fn adopt(&self, credential: &Credential) -> Result<(), SyncError> {
        info!(kind = credential.kind(), "Adopting new credential");
        self.shared.write_credential(Some(credential)).await?;
        Ok(())
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Runs one refresh cycle.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] class of the failure. The cached snapshot is
    /// left in place on every error.
    pub async fn refresh(&self) -> Result<CachedState, SyncError> {
        self.refresh_with(&CancellationToken::new()).await
    }

    /// Runs one refresh cycle that applies nothing once `cancel` fires.
    ///
    /// An in-flight fetch completes, but its result is discarded.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Cancelled` when cancelled, otherwise as
    /// [`refresh`](Self::refresh).
    #[instrument(skip_all)]
    pub async fn refresh_with(&self, cancel: &CancellationToken) -> Result<CachedState, SyncError> {
        let mut memo = self.memo.lock().await;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let result = self.run_cycle(&mut memo, cancel).await;
        match &result {
            Ok(state) => {
                debug!(fetched_at = %state.fetched_at, "Refresh succeeded");
                self.set_error(ErrorState::None);
            }
            Err(SyncError::Cancelled) => return result,
            Err(e) if e.is_sticky() => {
                warn!(error = %e, "Refresh failed, waiting for a new credential");
                self.set_error(ErrorState::from(e));
            }
            Err(e) => {
                debug!(error = %e, "Refresh failed");
                self.set_error(ErrorState::from(e));
            }
        }
        drop(memo);
        self.notify_changed();
        result
    }

    async fn run_cycle(
        &self,
        memo: &mut FailureMemo,
        cancel: &CancellationToken,
    ) -> Result<CachedState, SyncError> {
        let mut credential = self.shared.read_credential().await;
        let mut locked = false;

        // A missing or known-bad credential may have been rotated externally.
        if credential.is_none() || credential == memo.last_failed {
            match self.credentials.read_silent().await {
                Ok(Some(fresh)) if Some(&fresh) != memo.last_failed.as_ref() => {
                    if cancel.is_cancelled() {
                        return Err(SyncError::Cancelled);
                    }
                    if credential.as_ref() != Some(&fresh) {
                        self.adopt(&fresh).await?;
                    }
                    memo.last_failed = None;
                    credential = Some(fresh);
                }
                Ok(_) => debug!("Silent read found no new credential"),
                Err(e) => {
                    debug!(error = %e, "Silent credential read blocked");
                    locked = true;
                }
            }
        }

        let Some(credential) = credential else {
            return Err(if locked {
                SyncError::VaultLocked
            } else {
                SyncError::NoCredential
            });
        };
        if memo.last_failed.as_ref() == Some(&credential) {
            return Err(SyncError::AuthFailure);
        }

        let proxy = self.proxy().await;
        match self.client.fetch(&credential, proxy.as_ref()).await {
            Ok(snapshot) => self.apply(memo, snapshot, cancel).await,
            Err(e) if e.is_auth_failure() => {
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                self.recover(memo, credential, proxy.as_ref(), cancel).await
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                Err(e.into())
            }
        }
    }

    /// One silent re-read after a rejection, and at most one retry.
    async fn recover(
        &self,
        memo: &mut FailureMemo,
        failed: Credential,
        proxy: Option<&ProxyConfig>,
        cancel: &CancellationToken,
    ) -> Result<CachedState, SyncError> {
        warn!("Credential rejected, re-reading silently");

        let fresh = match self.credentials.read_silent().await {
            Err(e) => {
                info!(error = %e, "Secure store locked during recovery");
                memo.last_failed = None;
                return Err(SyncError::VaultLocked);
            }
            Ok(Some(fresh)) if fresh != failed => fresh,
            Ok(_) => {
                memo.last_failed = Some(failed);
                return Err(SyncError::AuthFailure);
            }
        };

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        self.adopt(&fresh).await?;

        let result = self.client.fetch(&fresh, proxy).await;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        match result {
            Ok(snapshot) => self.apply(memo, snapshot, cancel).await,
            Err(e) if e.is_auth_failure() => {
                memo.last_failed = Some(fresh);
                Err(SyncError::AuthFailure)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply(
        &self,
        memo: &mut FailureMemo,
        snapshot: tokeneater_core::UsageSnapshot,
        cancel: &CancellationToken,
    ) -> Result<CachedState, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let now = Utc::now();
        let state = CachedState::new(snapshot, now);
        self.shared.write_snapshot(&state).await?;
        memo.last_failed = None;

        if let Some(reader) = &self.stats {
            let stats = reader.read().await;
            if let Err(e) = self.shared.update_model_stats(stats).await {
                warn!(error = %e, "Failed to store model statistics");
            }
        }

        let settings = self.settings.get().await;
        if self.shared.thresholds().await != settings.thresholds
            && let Err(e) = self.shared.update_thresholds(settings.thresholds).await
        {
            warn!(error = %e, "Failed to publish thresholds");
        }

        if settings.notifications_enabled {
            self.notifications
                .evaluate(&state.snapshot, settings.thresholds, now)
                .await;
        }

        Ok(state)
    }

    // ========================================================================
    // Credential Management
    // ========================================================================

    /// Re-reads the credential silently and forgets the rejected one.
    pub(crate) async fn resync_credentials(&self) {
        let mut memo = self.memo.lock().await;
        match self.credentials.read_silent().await {
            Ok(Some(fresh)) => {
                if self.shared.read_credential().await.as_ref() != Some(&fresh)
                    && let Err(e) = self.adopt(&fresh).await
                {
                    warn!(error = %e, "Failed to store credential");
                }
            }
            Ok(None) => debug!("No credential during resync"),
            Err(e) => debug!(error = %e, "Silent read blocked during resync"),
        }
        memo.last_failed = None;
        drop(memo);
        self.set_error(ErrorState::None);
        self.notify_changed();
    }

    /// Resyncs the credential, clears the sticky failure and refreshes.
    ///
    /// # Errors
    ///
    /// As [`refresh`](Self::refresh).
    pub async fn reload_config(&self) -> Result<CachedState, SyncError> {
        info!("Reloading configuration");
        self.resync_credentials().await;
        self.refresh().await
    }

    /// Reads the credential interactively, adopts it and tests it.
    ///
    /// This may show the operating system's authorization prompt.
    ///
    /// # Errors
    ///
    /// - `NoCredential` when nothing is stored
    /// - `VaultLocked` when the read is refused
    /// - `Store` when the credential cannot be saved
    pub async fn connect_interactive(&self) -> Result<ConnectionTestResult, SyncError> {
        let credential = self
            .credentials
            .read_interactive()
            .await?
            .ok_or(SyncError::NoCredential)?;

        {
            let mut memo = self.memo.lock().await;
            self.adopt(&credential).await?;
            memo.last_failed = None;
        }
        self.set_error(ErrorState::None);
        self.notify_changed();

        let proxy = self.proxy().await;
        Ok(self.client.test_connection(&credential, proxy.as_ref()).await)
    }

    /// Tests the stored credential, or a silently read one.
    ///
    /// # Errors
    ///
    /// Returns `NoCredential` or `VaultLocked` when there is nothing to test.
    pub async fn test_connection(&self) -> Result<ConnectionTestResult, SyncError> {
        let credential = match self.shared.read_credential().await {
            Some(credential) => credential,
            None => self
                .credentials
                .read_silent()
                .await?
                .ok_or(SyncError::NoCredential)?,
        };
        let proxy = self.proxy().await;
        Ok(self.client.test_connection(&credential, proxy.as_ref()).await)
    }

    /// Sends a test alert through the configured notifier.
    pub async fn send_test_notification(&self) -> Alert {
        self.notifications.send_test().await
    }

    /// Clears the shared state and every notification level.
    ///
    /// # Errors
    ///
    /// Returns `Store` if either store cannot be cleared.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        let mut memo = self.memo.lock().await;
        info!("Signing out, clearing all state");
        self.shared.clear().await?;
        self.notifications.reset().await?;
        memo.last_failed = None;
        drop(memo);
        self.set_error(ErrorState::None);
        self.notify_changed();
        Ok(())
    }
}
