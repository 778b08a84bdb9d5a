//! Pacing projection over the weekly window.
//!
//! Compares actual consumption of the 7-day bucket with a linear burn over
//! the window. Pure functions, no I/O.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::usage::{UsageBucket, UsageSnapshot};

/// Length of the weekly window.
pub const PACING_WINDOW_DAYS: i64 = 7;

/// Delta (percentage points) beyond which pacing leaves the on-track zone.
pub const PACING_TOLERANCE: f64 = 10.0;

/// Pacing zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PacingZone {
    /// Consuming well below a linear burn.
    Chill,
    /// Within tolerance of a linear burn (inclusive).
    OnTrack,
    /// Consuming well above a linear burn.
    Hot,
}

impl PacingZone {
    /// Classifies a delta. Exactly ±10 is on track.
    pub fn from_delta(delta: f64) -> Self {
        if delta < -PACING_TOLERANCE {
            PacingZone::Chill
        } else if delta > PACING_TOLERANCE {
            PacingZone::Hot
        } else {
            PacingZone::OnTrack
        }
    }
}

impl std::fmt::Display for PacingZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacingZone::Chill => write!(f, "chill"),
            PacingZone::OnTrack => write!(f, "on track"),
            PacingZone::Hot => write!(f, "hot"),
        }
    }
}

/// Result of a pacing projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingResult {
    /// `actual_usage - expected_usage`, in percentage points.
    pub delta: f64,
    /// Usage a linear burn would have reached by now.
    pub expected_usage: f64,
    /// Reported utilization.
    pub actual_usage: f64,
    /// Zone derived from `delta`.
    pub zone: PacingZone,
    /// When the window resets.
    pub reset_at: Option<DateTime<Utc>>,
}

/// Pacing calculator for the weekly window.
pub struct PacingCalculator;

impl PacingCalculator {
    /// Projects pacing from the snapshot's 7-day bucket.
    ///
    /// Returns `None` when the bucket or its reset time is absent.
    pub fn calculate(snapshot: &UsageSnapshot, now: DateTime<Utc>) -> Option<PacingResult> {
        Self::for_bucket(snapshot.seven_day.as_ref()?, now)
    }

    /// Projects pacing for a single bucket with a 7-day window.
    #[allow(clippy::cast_precision_loss)]
    pub fn for_bucket(bucket: &UsageBucket, now: DateTime<Utc>) -> Option<PacingResult> {
        let resets_at = bucket.resets_at?;
        let window = Duration::days(PACING_WINDOW_DAYS);
        let window_start = resets_at - window;

        let elapsed = (now - window_start).num_milliseconds() as f64;
        let fraction = (elapsed / window.num_milliseconds() as f64).clamp(0.0, 1.0);

        let expected_usage = fraction * 100.0;
        let delta = bucket.utilization - expected_usage;

        Some(PacingResult {
            delta,
            expected_usage,
            actual_usage: bucket.utilization,
            zone: PacingZone::from_delta(delta),
            reset_at: Some(resets_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usage::BucketKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    /// A weekly bucket exactly half way through its window.
    fn halfway(utilization: f64) -> UsageSnapshot {
        let resets_at = now() + Duration::hours(84);
        UsageSnapshot::new().with_bucket(
            BucketKind::SevenDay,
            UsageBucket::new(utilization).with_resets_at(resets_at),
        )
    }

    fn zone(utilization: f64) -> PacingZone {
        PacingCalculator::calculate(&halfway(utilization), now())
            .unwrap()
            .zone
    }

    #[test]
    fn test_halfway_expected_usage() {
        let result = PacingCalculator::calculate(&halfway(55.0), now()).unwrap();
        assert!((result.expected_usage - 50.0).abs() < f64::EPSILON);
        assert!((result.delta - 5.0).abs() < f64::EPSILON);
        assert!((result.actual_usage - 55.0).abs() < f64::EPSILON);
        assert_eq!(result.reset_at, Some(now() + Duration::hours(84)));
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(zone(60.0), PacingZone::OnTrack);
        assert_eq!(zone(40.0), PacingZone::OnTrack);
        assert_eq!(zone(61.0), PacingZone::Hot);
        assert_eq!(zone(39.0), PacingZone::Chill);
    }

    #[test]
    fn test_from_delta_exact_values() {
        assert_eq!(PacingZone::from_delta(10.0), PacingZone::OnTrack);
        assert_eq!(PacingZone::from_delta(-10.0), PacingZone::OnTrack);
        assert_eq!(PacingZone::from_delta(10.000_001), PacingZone::Hot);
        assert_eq!(PacingZone::from_delta(-10.000_001), PacingZone::Chill);
    }

    #[test]
    fn test_elapsed_is_clamped() {
        // Window not started yet: expected usage clamps to 0.
        let future = UsageBucket::new(5.0).with_resets_at(now() + Duration::days(10));
        let result = PacingCalculator::for_bucket(&future, now()).unwrap();
        assert!(result.expected_usage.abs() < f64::EPSILON);

        // Reset already passed: expected usage clamps to 100.
        let past = UsageBucket::new(90.0).with_resets_at(now() - Duration::hours(1));
        let result = PacingCalculator::for_bucket(&past, now()).unwrap();
        assert!((result.expected_usage - 100.0).abs() < f64::EPSILON);
        assert_eq!(result.zone, PacingZone::OnTrack);
    }

    #[test]
    fn test_missing_inputs() {
        assert!(PacingCalculator::calculate(&UsageSnapshot::new(), now()).is_none());

        let no_reset = UsageSnapshot::new().with_bucket(BucketKind::SevenDay, UsageBucket::new(50.0));
        assert!(PacingCalculator::calculate(&no_reset, now()).is_none());
    }

    #[test]
    fn test_zone_serializes_camel_case() {
        assert_eq!(serde_json::to_string(&PacingZone::OnTrack).unwrap(), "\"onTrack\"");
    }
}
