//! Read-only entries for display surfaces.
//!
//! A display surface never fetches. It reads the shared store on its own
//! schedule and derives staleness from the age of the last sync.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokeneater_core::{
    ModelTokenStats, PacingCalculator, PacingResult, UsageSnapshot, UsageThresholds,
};
use tokeneater_store::{
    DEFAULT_DISPLAY_INTERVAL_SECS, DEFAULT_STALE_BUDGET_SECS, Settings, SharedStateStore,
};

/// Error text when no credential has been stored.
pub const NOT_CONFIGURED: &str = "not configured";

/// Error text when configured but nothing has been fetched yet.
pub const NO_DATA: &str = "no data";

/// What a display surface shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEntry {
    /// Entry timestamp.
    pub date: DateTime<Utc>,
    /// Last good snapshot.
    pub snapshot: Option<UsageSnapshot>,
    /// When the snapshot was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Whether the last sync is older than the staleness budget.
    pub is_stale: bool,
    /// Why there is nothing to show.
    pub error: Option<String>,
    /// Weekly pacing for `date`.
    pub pacing: Option<PacingResult>,
    /// Thresholds published by the foreground app.
    pub thresholds: UsageThresholds,
    /// Token totals per model.
    pub model_stats: Vec<ModelTokenStats>,
}

/// Builds [`DisplayEntry`] values from the shared store.
#[derive(Clone)]
pub struct EntryProvider {
    shared: Arc<dyn SharedStateStore>,
    stale_budget: Duration,
    display_interval: Duration,
}

impl std::fmt::Debug for EntryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryProvider")
            .field("stale_budget", &self.stale_budget)
            .field("display_interval", &self.display_interval)
            .finish_non_exhaustive()
    }
}

impl EntryProvider {
    /// Creates a provider with default budget and interval.
    pub fn new(shared: Arc<dyn SharedStateStore>) -> Self {
        Self {
            shared,
            stale_budget: Duration::from_secs(DEFAULT_STALE_BUDGET_SECS),
            display_interval: Duration::from_secs(DEFAULT_DISPLAY_INTERVAL_SECS),
        }
    }

    /// Creates a provider using the budget and interval from `settings`.
    pub fn from_settings(shared: Arc<dyn SharedStateStore>, settings: &Settings) -> Self {
        Self::new(shared)
            .with_stale_budget(settings.stale_budget())
            .with_display_interval(settings.display_interval())
    }

    /// Sets the staleness budget.
    #[must_use]
    pub fn with_stale_budget(mut self, budget: Duration) -> Self {
        self.stale_budget = budget;
        self
    }

    /// Sets the display refresh interval.
    #[must_use]
    pub fn with_display_interval(mut self, interval: Duration) -> Self {
        self.display_interval = interval;
        self
    }

    /// The latest entry.
    pub async fn latest(&self, now: DateTime<Utc>) -> DisplayEntry {
        let data = self.shared.load().await;
        let thresholds = data.thresholds.unwrap_or_default();

        let mut entry = DisplayEntry {
            date: now,
            snapshot: None,
            fetched_at: None,
            is_stale: false,
            error: None,
            pacing: None,
            thresholds,
            model_stats: data.model_stats.clone().unwrap_or_default(),
        };

        if data.credential().is_none() {
            entry.error = Some(NOT_CONFIGURED.to_string());
            return entry;
        }

        let Some(cached) = data.cached_usage else {
            entry.error = Some(NO_DATA.to_string());
            return entry;
        };

        let budget = chrono::Duration::from_std(self.stale_budget).ok();
        entry.is_stale = match (data.last_sync_date, budget) {
            (None, _) => true,
            (Some(synced), Some(budget)) => now - synced > budget,
            (Some(_), None) => false,
        };
        entry.pacing = PacingCalculator::calculate(&cached.snapshot, now);
        entry.fetched_at = Some(cached.fetched_at);
        entry.snapshot = Some(cached.snapshot);
        entry
    }

    /// When the surface should ask for its next entry.
    pub fn next_refresh(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.display_interval)
            .ok()
            .and_then(|interval| now.checked_add_signed(interval))
            .unwrap_or(now)
    }
}
