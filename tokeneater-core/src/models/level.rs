//! Usage levels, thresholds, and the metrics they apply to.

use serde::{Deserialize, Serialize};

use super::usage::{BucketKind, UsageBucket, UsageSnapshot};
use crate::error::CoreError;

// ============================================================================
// Thresholds
// ============================================================================

/// Warning and critical thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageThresholds {
    /// Orange at or above this percent.
    pub warning_percent: u8,
    /// Red at or above this percent.
    pub critical_percent: u8,
}

impl UsageThresholds {
    /// Default warning threshold.
    pub const DEFAULT_WARNING: u8 = 60;
    /// Default critical threshold.
    pub const DEFAULT_CRITICAL: u8 = 85;

    /// Creates validated thresholds.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` unless `0 < warning < critical <= 100`.
    pub fn new(warning_percent: u8, critical_percent: u8) -> Result<Self, CoreError> {
        let thresholds = Self {
            warning_percent,
            critical_percent,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Checks `0 < warning < critical <= 100`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` describing the violated bound.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.warning_percent == 0 {
            return Err(CoreError::InvalidConfig(
                "warning threshold must be above 0".to_string(),
            ));
        }
        if self.warning_percent >= self.critical_percent {
            return Err(CoreError::InvalidConfig(format!(
                "warning threshold {} must be below critical threshold {}",
                self.warning_percent, self.critical_percent
            )));
        }
        if self.critical_percent > 100 {
            return Err(CoreError::InvalidConfig(format!(
                "critical threshold {} exceeds 100",
                self.critical_percent
            )));
        }
        Ok(())
    }
}

impl Default for UsageThresholds {
    fn default() -> Self {
        Self {
            warning_percent: Self::DEFAULT_WARNING,
            critical_percent: Self::DEFAULT_CRITICAL,
        }
    }
}

// ============================================================================
// Usage Level
// ============================================================================

/// Traffic-light level of a metric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    /// Below the warning threshold.
    #[default]
    Green,
    /// At or above warning, below critical.
    Orange,
    /// At or above critical.
    Red,
}

impl UsageLevel {
    /// Classifies a percentage against thresholds.
    pub fn from_percent(percent: f64, thresholds: UsageThresholds) -> Self {
        if percent >= f64::from(thresholds.critical_percent) {
            UsageLevel::Red
        } else if percent >= f64::from(thresholds.warning_percent) {
            UsageLevel::Orange
        } else {
            UsageLevel::Green
        }
    }
}

impl std::fmt::Display for UsageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageLevel::Green => write!(f, "green"),
            UsageLevel::Orange => write!(f, "orange"),
            UsageLevel::Red => write!(f, "red"),
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Whether a metric tracks the session window or a weekly window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Short (5-hour) window.
    Session,
    /// Long (7-day) window.
    Weekly,
}

/// Displayable metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricId {
    /// Session usage (5-hour bucket).
    FiveHour,
    /// Weekly usage (7-day bucket).
    SevenDay,
    /// Weekly Sonnet usage.
    Sonnet,
    /// Weekly pacing.
    Pacing,
}

impl MetricId {
    /// Metrics that carry a percentage and are watched for alerts.
    pub const ALERTABLE: [MetricId; 3] = [MetricId::FiveHour, MetricId::SevenDay, MetricId::Sonnet];

    /// Stable key used for persisted state.
    pub fn key(self) -> &'static str {
        match self {
            MetricId::FiveHour => "fiveHour",
            MetricId::SevenDay => "sevenDay",
            MetricId::Sonnet => "sonnet",
            MetricId::Pacing => "pacing",
        }
    }

    /// Parses a key produced by [`key`](Self::key).
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "fiveHour" => Some(MetricId::FiveHour),
            "sevenDay" => Some(MetricId::SevenDay),
            "sonnet" => Some(MetricId::Sonnet),
            "pacing" => Some(MetricId::Pacing),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            MetricId::FiveHour => "Session",
            MetricId::SevenDay => "Weekly",
            MetricId::Sonnet => "Sonnet",
            MetricId::Pacing => "Pacing",
        }
    }

    /// Compact label for tight layouts.
    pub fn short_label(self) -> &'static str {
        match self {
            MetricId::FiveHour => "5h",
            MetricId::SevenDay => "7d",
            MetricId::Sonnet => "S",
            MetricId::Pacing => "P",
        }
    }

    /// Window type of the metric.
    pub fn metric_type(self) -> MetricType {
        match self {
            MetricId::FiveHour => MetricType::Session,
            MetricId::SevenDay | MetricId::Sonnet | MetricId::Pacing => MetricType::Weekly,
        }
    }

    /// Bucket backing this metric, if it is percentage based.
    pub fn bucket_kind(self) -> Option<BucketKind> {
        match self {
            MetricId::FiveHour => Some(BucketKind::FiveHour),
            MetricId::SevenDay => Some(BucketKind::SevenDay),
            MetricId::Sonnet => Some(BucketKind::SevenDaySonnet),
            MetricId::Pacing => None,
        }
    }

    /// Looks up the bucket for this metric in a snapshot.
    pub fn bucket(self, snapshot: &UsageSnapshot) -> Option<&UsageBucket> {
        snapshot.bucket(self.bucket_kind()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_classification() {
        let th = UsageThresholds::default();
        assert_eq!(UsageLevel::from_percent(59.9, th), UsageLevel::Green);
        assert_eq!(UsageLevel::from_percent(60.0, th), UsageLevel::Orange);
        assert_eq!(UsageLevel::from_percent(84.99, th), UsageLevel::Orange);
        assert_eq!(UsageLevel::from_percent(85.0, th), UsageLevel::Red);
        assert!(UsageLevel::Red > UsageLevel::Orange);
        assert!(UsageLevel::Orange > UsageLevel::Green);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(UsageThresholds::new(60, 85).is_ok());
        assert!(UsageThresholds::new(0, 85).is_err());
        assert!(UsageThresholds::new(85, 85).is_err());
        assert!(UsageThresholds::new(90, 80).is_err());
        assert!(UsageThresholds::new(50, 101).is_err());
    }

    #[test]
    fn test_threshold_serde_keys() {
        let json = serde_json::to_value(UsageThresholds::default()).unwrap();
        assert_eq!(json["warningPercent"], 60);
        assert_eq!(json["criticalPercent"], 85);
    }

    #[test]
    fn test_metric_keys_roundtrip() {
        for metric in [MetricId::FiveHour, MetricId::SevenDay, MetricId::Sonnet, MetricId::Pacing] {
            assert_eq!(MetricId::from_key(metric.key()), Some(metric));
        }
        assert_eq!(MetricId::from_key("opus"), None);
    }
}
