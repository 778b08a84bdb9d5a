//! Usage-related types.
//!
//! This module contains types related to usage tracking:
//! - [`UsageBucket`] - One named metric (percentage + reset time)
//! - [`UsageSnapshot`] - The full set of buckets from one fetch
//! - [`CachedState`] - A snapshot plus the time it was fetched
//!
//! ## Tolerant decoding
//!
//! Snapshots are decoded bucket by bucket. A bucket that fails to decode
//! becomes `None` instead of failing the whole payload, and unknown keys are
//! ignored. The same decoder reads the wire payload and the cached copy in the
//! shared state file, so both sides agree on what "absent" means.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

// ============================================================================
// Bucket Kind
// ============================================================================

/// Named buckets carried by the usage payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    /// Short rolling window (5 hours).
    FiveHour,
    /// Long rolling window (7 days), all models.
    SevenDay,
    /// Long window restricted to the Sonnet model family.
    SevenDaySonnet,
    /// Long window restricted to the Opus model family.
    SevenDayOpus,
    /// Long window for OAuth apps.
    SevenDayOauthApps,
    /// Long window for cowork usage.
    SevenDayCowork,
}

impl BucketKind {
    /// Every bucket kind, in wire order.
    pub const ALL: [BucketKind; 6] = [
        BucketKind::FiveHour,
        BucketKind::SevenDay,
        BucketKind::SevenDaySonnet,
        BucketKind::SevenDayOauthApps,
        BucketKind::SevenDayOpus,
        BucketKind::SevenDayCowork,
    ];

    /// Key used for this bucket in the JSON payload.
    pub fn wire_name(self) -> &'static str {
        match self {
            BucketKind::FiveHour => "five_hour",
            BucketKind::SevenDay => "seven_day",
            BucketKind::SevenDaySonnet => "seven_day_sonnet",
            BucketKind::SevenDayOpus => "seven_day_opus",
            BucketKind::SevenDayOauthApps => "seven_day_oauth_apps",
            BucketKind::SevenDayCowork => "seven_day_cowork",
        }
    }
}

// ============================================================================
// Usage Bucket
// ============================================================================

/// One named usage metric.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageBucket {
    /// Percentage of quota used (0-100).
    pub utilization: f64,
    /// When this window resets.
    pub resets_at: Option<DateTime<Utc>>,
}

/// Wire shape of a bucket. `resets_at` stays a string so that an
/// unparsable timestamp does not take the utilization down with it.
#[derive(Deserialize)]
struct WireBucket {
    utilization: f64,
    #[serde(default)]
    resets_at: Option<String>,
}

impl UsageBucket {
    /// Creates a bucket with the given utilization and no reset time.
    pub fn new(utilization: f64) -> Self {
        Self {
            utilization,
            resets_at: None,
        }
    }

    /// Sets the reset time.
    #[must_use]
    pub fn with_resets_at(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Returns the utilization truncated to a whole percent, as displayed.
    #[allow(clippy::cast_possible_truncation)]
    pub fn whole_percent(&self) -> i64 {
        self.utilization.trunc() as i64
    }

    /// Clamps utilization to [0, 100], replacing NaN/Infinity with 0.
    pub fn sanitize(&mut self) {
        if !self.utilization.is_finite() {
            self.utilization = 0.0;
        }
        self.utilization = self.utilization.clamp(0.0, 100.0);
    }

    fn from_wire(value: Value) -> Option<Self> {
        let wire: WireBucket = serde_json::from_value(value).ok()?;
        Some(Self {
            utilization: wire.utilization,
            resets_at: wire.resets_at.as_deref().and_then(parse_timestamp),
        })
    }
}

/// Parses an ISO-8601 timestamp with or without fractional seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Serialize for UsageBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("utilization", &self.utilization)?;
        map.serialize_entry(
            "resets_at",
            &self
                .resets_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        )?;
        map.end()
    }
}

// ============================================================================
// Usage Snapshot
// ============================================================================

/// The full set of buckets returned by one fetch.
///
/// - `five_hour` = short (session) window
/// - `seven_day` = long (weekly) window
/// - `seven_day_sonnet` = long window for one model family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageSnapshot {
    /// 5-hour window.
    pub five_hour: Option<UsageBucket>,
    /// 7-day window (all models).
    pub seven_day: Option<UsageBucket>,
    /// 7-day Sonnet window.
    pub seven_day_sonnet: Option<UsageBucket>,
    /// 7-day Opus window.
    pub seven_day_opus: Option<UsageBucket>,
    /// 7-day OAuth apps window.
    pub seven_day_oauth_apps: Option<UsageBucket>,
    /// 7-day cowork window.
    pub seven_day_cowork: Option<UsageBucket>,
}

impl UsageSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bucket for a kind.
    pub fn bucket(&self, kind: BucketKind) -> Option<&UsageBucket> {
        self.slot(kind).as_ref()
    }

    /// Sets the bucket for a kind.
    pub fn set_bucket(&mut self, kind: BucketKind, bucket: Option<UsageBucket>) {
        *self.slot_mut(kind) = bucket;
    }

    /// Builder-style variant of [`set_bucket`](Self::set_bucket).
    #[must_use]
    pub fn with_bucket(mut self, kind: BucketKind, bucket: UsageBucket) -> Self {
        self.set_bucket(kind, Some(bucket));
        self
    }

    /// Number of buckets present.
    pub fn bucket_count(&self) -> usize {
        BucketKind::ALL
            .iter()
            .filter(|k| self.bucket(**k).is_some())
            .count()
    }

    /// Returns true if any bucket is present.
    pub fn has_data(&self) -> bool {
        self.bucket_count() > 0
    }

    /// Returns `None` for a snapshot without buckets.
    ///
    /// An empty snapshot is never a zeroed snapshot; callers treat it as
    /// "no data".
    pub fn non_empty(self) -> Option<Self> {
        self.has_data().then_some(self)
    }

    /// Clamps every bucket to valid ranges.
    pub fn sanitize(&mut self) {
        for kind in BucketKind::ALL {
            if let Some(bucket) = self.slot_mut(kind) {
                bucket.sanitize();
            }
        }
    }

    /// Decodes a payload tolerantly.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the body is not a JSON object.
    /// A valid object with no decodable bucket yields an empty snapshot.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, CoreError> {
        let map: Map<String, Value> = serde_json::from_slice(body)?;
        Ok(Self::from_map(map))
    }

    fn from_map(mut map: Map<String, Value>) -> Self {
        let mut snapshot = Self::new();
        for kind in BucketKind::ALL {
            let bucket = map.remove(kind.wire_name()).and_then(UsageBucket::from_wire);
            snapshot.set_bucket(kind, bucket);
        }
        snapshot
    }

    fn slot(&self, kind: BucketKind) -> &Option<UsageBucket> {
        match kind {
            BucketKind::FiveHour => &self.five_hour,
            BucketKind::SevenDay => &self.seven_day,
            BucketKind::SevenDaySonnet => &self.seven_day_sonnet,
            BucketKind::SevenDayOpus => &self.seven_day_opus,
            BucketKind::SevenDayOauthApps => &self.seven_day_oauth_apps,
            BucketKind::SevenDayCowork => &self.seven_day_cowork,
        }
    }

    fn slot_mut(&mut self, kind: BucketKind) -> &mut Option<UsageBucket> {
        match kind {
            BucketKind::FiveHour => &mut self.five_hour,
            BucketKind::SevenDay => &mut self.seven_day,
            BucketKind::SevenDaySonnet => &mut self.seven_day_sonnet,
            BucketKind::SevenDayOpus => &mut self.seven_day_opus,
            BucketKind::SevenDayOauthApps => &mut self.seven_day_oauth_apps,
            BucketKind::SevenDayCowork => &mut self.seven_day_cowork,
        }
    }
}

impl Serialize for UsageSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.bucket_count()))?;
        for kind in BucketKind::ALL {
            if let Some(bucket) = self.bucket(kind) {
                map.serialize_entry(kind.wire_name(), bucket)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for UsageSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(de::Error::invalid_type(
                de::Unexpected::Other(json_kind(&other)),
                &"a usage object",
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Cached State
// ============================================================================

/// The last good snapshot and when it was fetched.
///
/// Written once per successful sync and superseded by later writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedState {
    /// The snapshot.
    #[serde(rename = "usage")]
    pub snapshot: UsageSnapshot,
    /// When the snapshot was fetched.
    #[serde(rename = "fetchDate")]
    pub fetched_at: DateTime<Utc>,
}

impl CachedState {
    /// Creates a cached state.
    pub fn new(snapshot: UsageSnapshot, fetched_at: DateTime<Utc>) -> Self {
        Self {
            snapshot,
            fetched_at,
        }
    }

    /// Age of the snapshot at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    /// Returns true if the snapshot is older than `budget` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, budget: Duration) -> bool {
        self.age(now) > budget
    }
}

// ============================================================================
// Tests
// ============================================================================
