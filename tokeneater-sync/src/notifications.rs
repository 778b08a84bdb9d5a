//! Threshold alerts.
//!
//! Each alertable metric has a last notified level. An evaluation only acts
//! on transitions: rising levels escalate, a return to green recovers, and
//! any other drop is recorded silently. Levels are persisted through a
//! [`LevelStore`] so a restart does not announce the same state again.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokeneater_core::{
    MetricId, PacingCalculator, PacingZone, UsageLevel, UsageSnapshot, UsageThresholds,
};
use tokeneater_store::LevelStore;
use tracing::{debug, info, warn};

use crate::format::{alert_title, escalation_body, recovery_body};

// ============================================================================
// Alerts
// ============================================================================

/// Direction of a level change that produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    /// Level rose.
    Escalation,
    /// Level fell back to green.
    Recovery,
    /// Manually requested test alert.
    Test,
}

/// A notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Stable identifier; a newer alert with the same id replaces the older.
    pub id: String,
    /// Escalation or recovery.
    pub kind: AlertKind,
    /// Metric that changed, absent for test alerts.
    pub metric: Option<MetricId>,
    /// Level after the change.
    pub level: UsageLevel,
    /// Whole percent at the time of the change.
    pub percent: i64,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Alert {
    fn test() -> Self {
        Self {
            id: format!("test_{}", Utc::now().timestamp()),
            kind: AlertKind::Test,
            metric: None,
            level: UsageLevel::Green,
            percent: 0,
            title: "TokenEater".to_string(),
            body: "Notifications are working.".to_string(),
        }
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Delivers alerts to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one alert. Delivery failures are logged, not returned.
    async fn deliver(&self, alert: &Alert);
}

/// Writes alerts to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, alert: &Alert) {
        info!(id = %alert.id, level = %alert.level, percent = alert.percent, "{}: {}", alert.title, alert.body);
    }
}

/// Keeps every delivered alert, for tests and previews.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts delivered so far, oldest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, alert: &Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert.clone());
    }
}

/// Desktop notifications through `osascript` on macOS and `notify-send`
/// elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNotifier;

impl SystemNotifier {
    #[cfg(target_os = "macos")]
    fn command(alert: &Alert) -> tokio::process::Command {
        // Quotes would end the AppleScript string literal.
        let body = alert.body.replace('"', "\\\"").replace('\n', " ");
        let title = alert.title.replace('"', "\\\"");
        let script = format!("display notification \"{body}\" with title \"{title}\" sound name \"default\"");
        let mut cmd = tokio::process::Command::new("osascript");
        cmd.args(["-e", &script]);
        cmd
    }

    #[cfg(not(target_os = "macos"))]
    fn command(alert: &Alert) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("notify-send");
        cmd.args(["--app-name=TokenEater", &alert.title, &alert.body]);
        cmd
    }
}

#[async_trait]
impl Notifier for SystemNotifier {
    async fn deliver(&self, alert: &Alert) {
        info!(id = %alert.id, level = %alert.level, percent = alert.percent, "Sending notification");
        match Self::command(alert).status().await {
            Ok(status) if status.success() => debug!(id = %alert.id, "Notification sent"),
            Ok(status) => warn!(id = %alert.id, %status, "Notification command failed"),
            Err(e) => warn!(id = %alert.id, error = %e, "Notification command unavailable"),
        }
    }
}

// ============================================================================
// Notification Engine
// ============================================================================

/// Edge-triggered level tracking per metric.
#[derive(Clone)]
pub struct NotificationEngine {
    levels: Arc<dyn LevelStore>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for NotificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEngine").finish_non_exhaustive()
    }
}

impl NotificationEngine {
    /// Creates an engine over a level store and a notifier.
    pub fn new(levels: Arc<dyn LevelStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { levels, notifier }
    }

    /// Evaluates every alertable metric present in `snapshot`.
    ///
    /// Metrics whose bucket is absent keep their last level. Session alerts
    /// use the weekly pacing zone.
    pub async fn evaluate(
        &self,
        snapshot: &UsageSnapshot,
        thresholds: UsageThresholds,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let pacing = PacingCalculator::calculate(snapshot, now).map(|p| p.zone);
        let mut alerts = Vec::new();

        for metric in MetricId::ALERTABLE {
            let Some(bucket) = metric.bucket(snapshot) else {
                continue;
            };
            let zone = match metric {
                MetricId::FiveHour => pacing,
                _ => None,
            };
            if let Some(alert) = self
                .check(metric, bucket.whole_percent(), bucket.resets_at, zone, thresholds, now)
                .await
            {
                alerts.push(alert);
            }
        }

        alerts
    }

    /// Compares one metric against its last level and alerts on transitions.
    #[allow(clippy::cast_precision_loss)]
    pub async fn check(
        &self,
        metric: MetricId,
        percent: i64,
        resets_at: Option<DateTime<Utc>>,
        pacing: Option<PacingZone>,
        thresholds: UsageThresholds,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let previous = self.levels.last_level(metric).await;
        let current = UsageLevel::from_percent(percent as f64, thresholds);
        if current == previous {
            return None;
        }

        if let Err(e) = self.levels.set_last_level(metric, current).await {
            warn!(metric = metric.key(), error = %e, "Failed to persist notification level");
        }

        let metric_type = metric.metric_type();
        let alert = if current > previous {
            Alert {
                id: format!("escalation_{}", metric.key()),
                kind: AlertKind::Escalation,
                metric: Some(metric),
                level: current,
                percent,
                title: alert_title(current, metric.label(), percent),
                body: escalation_body(metric_type, current, resets_at, pacing, thresholds, now),
            }
        } else if current == UsageLevel::Green {
            Alert {
                id: format!("recovery_{}", metric.key()),
                kind: AlertKind::Recovery,
                metric: Some(metric),
                level: current,
                percent,
                title: alert_title(current, metric.label(), percent),
                body: recovery_body(metric_type, resets_at, now),
            }
        } else {
            debug!(metric = metric.key(), from = %previous, to = %current, "Level dropped, no alert");
            return None;
        };

        self.notifier.deliver(&alert).await;
        Some(alert)
    }

    /// Sends a test alert.
    pub async fn send_test(&self) -> Alert {
        let alert = Alert::test();
        self.notifier.deliver(&alert).await;
        alert
    }

    /// Forgets every recorded level.
    ///
    /// # Errors
    ///
    /// Returns the store error if the levels cannot be cleared.
    pub async fn reset(&self) -> Result<(), tokeneater_store::StoreError> {
        self.levels.clear().await
    }
}
