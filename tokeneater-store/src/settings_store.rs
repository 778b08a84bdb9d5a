//! Process-local user settings.
//!
//! Settings live in `settings.json` in the per-user config directory. They
//! are not shared across processes; values readers need (thresholds) are
//! published separately through the shared state store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokeneater_core::{MetricId, ProxyConfig, UsageThresholds};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json_or_default, save_json};

/// Default primary polling interval.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Shortest polling interval accepted.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Default refresh interval for display surfaces.
pub const DEFAULT_DISPLAY_INTERVAL_SECS: u64 = 300;

/// Default age after which a snapshot is shown as stale.
pub const DEFAULT_STALE_BUDGET_SECS: u64 = 120;

// ============================================================================
// Settings Types
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SOCKS proxy for outbound requests.
    pub proxy: ProxyConfig,

    /// Level thresholds.
    pub thresholds: UsageThresholds,

    /// Primary polling interval, in seconds.
    pub poll_interval_secs: u64,

    /// Display refresh interval, in seconds.
    pub display_interval_secs: u64,

    /// Age in seconds after which cached data is flagged stale.
    pub stale_budget_secs: u64,

    /// Whether threshold alerts are delivered.
    pub notifications_enabled: bool,

    /// Metrics shown in compact displays.
    pub pinned_metrics: Vec<MetricId>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            thresholds: UsageThresholds::default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            display_interval_secs: DEFAULT_DISPLAY_INTERVAL_SECS,
            stale_budget_secs: DEFAULT_STALE_BUDGET_SECS,
            notifications_enabled: true,
            pinned_metrics: vec![MetricId::FiveHour, MetricId::SevenDay],
        }
    }
}

impl Settings {
    /// Polling interval, never below the minimum.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    /// Display refresh interval.
    pub fn display_interval(&self) -> Duration {
        Duration::from_secs(self.display_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    /// Staleness budget.
    pub fn stale_budget(&self) -> Duration {
        Duration::from_secs(self.stale_budget_secs)
    }

    /// Proxy settings when enabled.
    pub fn active_proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.enabled.then_some(&self.proxy)
    }

    /// Replaces invalid fields with safe values.
    fn repair(&mut self) {
        if self.thresholds.validate().is_err() {
            self.thresholds = UsageThresholds::default();
        }
        self.poll_interval_secs = self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS);
        if self.proxy.host.trim().is_empty() || self.proxy.port == 0 {
            self.proxy.enabled = false;
        }
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` for invalid thresholds, a polling
    /// interval under the minimum, or an enabled proxy without a host.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.thresholds
            .validate()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(StoreError::Config(format!(
                "polling interval must be at least {MIN_POLL_INTERVAL_SECS}s"
            )));
        }
        if self.proxy.enabled && (self.proxy.host.trim().is_empty() || self.proxy.port == 0) {
            return Err(StoreError::Config(
                "proxy needs a host and a non-zero port".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Settings with persistence and change notification.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
    notify: Arc<watch::Sender<u64>>,
}

impl SettingsStore {
    /// Creates a store with default settings.
    pub fn new(path: PathBuf) -> Self {
        Self::with_settings(path, Settings::default())
    }

    fn with_settings(path: PathBuf, settings: Settings) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
            notify: Arc::new(notify),
        }
    }

    /// Loads settings from the default path.
    pub async fn load_default() -> Self {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from a path. Missing or invalid files give defaults.
    pub async fn load(path: PathBuf) -> Self {
        let mut settings: Settings = load_json_or_default(&path).await;
        if let Err(e) = settings.validate() {
            info!(path = %path.display(), error = %e, "Stored settings invalid, repairing");
            settings.repair();
        }
        debug!(path = %path.display(), "Settings loaded");
        Self::with_settings(path, settings)
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Applies a change, validates it, persists it, and notifies subscribers.
    ///
    /// An invalid result leaves the settings untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` when validation fails, or an IO error if
    /// the file cannot be written.
    pub async fn update<F>(&self, f: F) -> Result<Settings, StoreError>
    where
        F: FnOnce(&mut Settings) + Send,
    {
        let updated = {
            let mut settings = self.settings.write().await;
            let mut candidate = settings.clone();
            f(&mut candidate);
            candidate.validate()?;
            *settings = candidate.clone();
            candidate
        };

        save_json(&self.path, &updated).await?;
        self.notify.send_modify(|v| *v += 1);
        info!(path = %self.path.display(), "Settings saved");
        Ok(updated)
    }

    /// Subscribes to settings changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    // ========================================================================
    // Convenience Methods
    // ========================================================================

    /// Gets the thresholds.
    pub async fn thresholds(&self) -> UsageThresholds {
        self.settings.read().await.thresholds
    }

    /// Sets the thresholds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` unless `0 < warning < critical <= 100`.
    pub async fn set_thresholds(&self, warning: u8, critical: u8) -> Result<(), StoreError> {
        self.update(|s| {
            s.thresholds = UsageThresholds {
                warning_percent: warning,
                critical_percent: critical,
            };
        })
        .await
        .map(|_| ())
    }

    /// Gets the proxy settings.
    pub async fn proxy(&self) -> ProxyConfig {
        self.settings.read().await.proxy.clone()
    }

    /// Sets the proxy settings.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` for an enabled proxy without a host.
    pub async fn set_proxy(&self, proxy: ProxyConfig) -> Result<(), StoreError> {
        self.update(|s| s.proxy = proxy).await.map(|_| ())
    }

    /// Gets the polling interval.
    pub async fn poll_interval(&self) -> Duration {
        self.settings.read().await.poll_interval()
    }

    /// Sets the polling interval in seconds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` below the minimum interval.
    pub async fn set_poll_interval(&self, secs: u64) -> Result<(), StoreError> {
        self.update(|s| s.poll_interval_secs = secs).await.map(|_| ())
    }

    /// Gets whether alerts are delivered.
    pub async fn notifications_enabled(&self) -> bool {
        self.settings.read().await.notifications_enabled
    }

    /// Enables or disables alerts.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub async fn set_notifications_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.update(|s| s.notifications_enabled = enabled)
            .await
            .map(|_| ())
    }

    /// Restores defaults.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.update(|s| *s = Settings::default()).await.map(|_| ())
    }
}
