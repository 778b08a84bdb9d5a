//! Persistence round-trip and edge case tests.
//!
//! Tests file I/O operations, atomic replacement, and settings round-trip.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use tokeneater_core::{
    BucketKind, CachedState, MetricId, ProxyConfig, UsageBucket, UsageSnapshot, UsageThresholds,
};

use crate::persistence::{ensure_dir, load_json, load_json_or_default, save_json, write_atomic};
use crate::settings_store::Settings;
use crate::shared_state::SharedData;

// ============================================================================
// JSON Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_settings_full_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("settings.json");

    let settings = Settings {
        proxy: ProxyConfig::socks5("10.0.0.2", 9050),
        thresholds: UsageThresholds::new(50, 75).unwrap(),
        poll_interval_secs: 120,
        display_interval_secs: 600,
        stale_budget_secs: 240,
        notifications_enabled: false,
        pinned_metrics: vec![MetricId::Sonnet, MetricId::Pacing],
    };

    save_json(&file_path, &settings).await.unwrap();
    let loaded: Settings = load_json(&file_path).await.unwrap();

    assert_eq!(loaded, settings);
    assert_eq!(
        loaded.active_proxy().and_then(ProxyConfig::url).as_deref(),
        Some("socks5h://10.0.0.2:9050")
    );
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested_path = temp_dir
        .path()
        .join("deeply")
        .join("nested")
        .join("shared.json");

    save_json(&nested_path, &serde_json::json!({"key": "value"}))
        .await
        .unwrap();
    assert!(nested_path.exists());
}

#[tokio::test]
async fn test_load_nonexistent_file() {
    let file_path = PathBuf::from("/nonexistent/path/settings.json");

    let result: Result<Settings, _> = load_json(&file_path).await;
    assert!(result.is_err());

    let fallback: Settings = load_json_or_default(&file_path).await;
    assert_eq!(fallback, Settings::default());
}

#[tokio::test]
async fn test_ensure_dir_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir_path = temp_dir.path().join("test_dir");

    ensure_dir(&dir_path).await.unwrap();
    ensure_dir(&dir_path).await.unwrap();

    assert!(dir_path.is_dir());
}

// ============================================================================
// Backward Compatibility Tests
// ============================================================================

#[tokio::test]
async fn test_load_minimal_json_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("minimal.json");
    tokio::fs::write(&file_path, "{}").await.unwrap();

    let loaded: Settings = load_json(&file_path).await.unwrap();
    assert_eq!(loaded, Settings::default());
}

#[tokio::test]
async fn test_load_json_with_unknown_fields() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("extra_fields.json");

    let json = r#"{
        "poll_interval_secs": 30,
        "unknown_field_1": "value1",
        "nested_unknown": {"key": "value"}
    }"#;
    tokio::fs::write(&file_path, json).await.unwrap();

    let loaded: Settings = load_json(&file_path).await.unwrap();
    assert_eq!(loaded.poll_interval_secs, 30);
}

#[tokio::test]
async fn test_corrupt_file_loads_default() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("corrupt.json");
    tokio::fs::write(&file_path, "{not json").await.unwrap();

    let loaded: Settings = load_json_or_default(&file_path).await;
    assert_eq!(loaded, Settings::default());
}

// ============================================================================
// Atomic Replacement
// ============================================================================

#[tokio::test]
async fn test_atomic_write_leaves_no_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("atomic.json");

    save_json(&file_path, &Settings::default()).await.unwrap();
    save_json(&file_path, &Settings::default()).await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["atomic.json".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_documents() {
    let temp_dir = TempDir::new().unwrap();
    let path = Arc::new(temp_dir.path().join("shared.json"));

    let snapshot = UsageSnapshot::new()
        .with_bucket(BucketKind::FiveHour, UsageBucket::new(42.0))
        .with_bucket(BucketKind::SevenDay, UsageBucket::new(17.0));
    let data = SharedData {
        oauth_token: Some("x".repeat(4096)),
        cached_usage: Some(CachedState::new(snapshot, Utc::now())),
        ..SharedData::default()
    };
    let bytes = Arc::new(serde_json::to_vec_pretty(&data).unwrap());
    write_atomic(&path, &bytes).await.unwrap();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let path = Arc::clone(&path);
            let bytes = Arc::clone(&bytes);
            tokio::spawn(async move {
                for _ in 0..25 {
                    write_atomic(&path, &bytes).await.unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let path = Arc::clone(&path);
        let bytes = Arc::clone(&bytes);
        tokio::spawn(async move {
            for _ in 0..200 {
                let read = tokio::fs::read(&*path).await.unwrap();
                assert_eq!(read.len(), bytes.len());
                let decoded = SharedData::from_slice(&read);
                assert!(decoded.cached_usage.is_some());
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();
}
