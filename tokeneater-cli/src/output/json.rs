//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokeneater_core::{
    BucketKind, CachedState, ModelTokenStats, PacingResult, UsageLevel, UsageSnapshot,
    UsageThresholds,
};
use tokeneater_sync::{DisplayEntry, ErrorState};

use super::text::bucket_label;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a usage report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput {
    pub buckets: Vec<BucketOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub thresholds: UsageThresholds,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub model_stats: Vec<ModelTokenStats>,
}

/// A single usage bucket.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketOutput {
    pub name: String,
    pub label: String,
    pub utilization: f64,
    pub level: UsageLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a display entry.
    pub fn format_entry(&self, entry: &DisplayEntry) -> Result<String> {
        let output = UsageOutput {
            buckets: entry
                .snapshot
                .as_ref()
                .map(|s| buckets_to_output(s, entry.thresholds))
                .unwrap_or_default(),
            pacing: entry.pacing.clone(),
            fetched_at: entry.fetched_at,
            is_stale: entry.is_stale,
            error: entry.error.clone(),
            thresholds: entry.thresholds,
            model_stats: entry.model_stats.clone(),
        };
        self.format(&output)
    }

    /// Formats the result of a sync cycle.
    pub fn format_sync(
        &self,
        state: &CachedState,
        pacing: Option<&PacingResult>,
        thresholds: UsageThresholds,
        error: &ErrorState,
    ) -> Result<String> {
        let output = UsageOutput {
            buckets: buckets_to_output(&state.snapshot, thresholds),
            pacing: pacing.cloned(),
            fetched_at: Some(state.fetched_at),
            is_stale: false,
            error: error.message(),
            thresholds,
            model_stats: Vec::new(),
        };
        self.format(&output)
    }
}

/// Converts the buckets present in a snapshot, in wire order.
pub fn buckets_to_output(snapshot: &UsageSnapshot, thresholds: UsageThresholds) -> Vec<BucketOutput> {
    BucketKind::ALL
        .iter()
        .filter_map(|&kind| {
            snapshot.bucket(kind).map(|bucket| BucketOutput {
                name: kind.wire_name().to_string(),
                label: bucket_label(kind).to_string(),
                utilization: bucket.utilization,
                level: UsageLevel::from_percent(bucket.utilization, thresholds),
                resets_at: bucket.resets_at,
            })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
