//! Cross-process shared state.
//!
//! One JSON document per user, read by every process and written by the sync
//! owner. The document carries the credential, the last good snapshot, the
//! last sync time, and a few display settings published for readers.
//!
//! ```json
//! {
//!   "oauthToken": "...",
//!   "cachedUsage": {"usage": {"five_hour": {...}}, "fetchDate": "..."},
//!   "lastSyncDate": "2025-06-10T12:00:00Z",
//!   "theme": {...},
//!   "thresholds": {"warningPercent": 60, "criticalPercent": 85},
//!   "modelStats": [{"modelName": "Sonnet 4.6", "totalTokens": 1200}]
//! }
//! ```
//!
//! Reads never fail: a missing or unparsable document reads as empty, and a
//! field that fails to decode reads as absent.

use std::path::{Path, PathBuf};
use std::sync::{Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokeneater_core::{CachedState, Credential, ModelTokenStats, UsageThresholds};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::migration::migrate_legacy;
use crate::persistence::{default_app_support_dir, save_json};

/// Current shared directory name.
pub const SHARED_DIR_NAME: &str = "com.tokeneater.shared";

/// Legacy shared directory name.
pub const LEGACY_SHARED_DIR_NAME: &str = "com.claudeusagewidget.shared";

/// Shared document file name.
pub const SHARED_FILE_NAME: &str = "shared.json";

// ============================================================================
// Shared Document
// ============================================================================

/// The shared document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedData {
    /// Bearer token adopted by the sync owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,
    /// Last good snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_usage: Option<CachedState>,
    /// When the last successful sync happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_date: Option<DateTime<Utc>>,
    /// Display theme, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Value>,
    /// Thresholds published by the foreground app.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<UsageThresholds>,
    /// Token totals per model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_stats: Option<Vec<ModelTokenStats>>,
}

impl SharedData {
    /// Decodes each field independently, dropping the ones that fail.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };

        Self {
            oauth_token: take(&mut map, "oauthToken"),
            cached_usage: take::<CachedState>(&mut map, "cachedUsage")
                .filter(|c| c.snapshot.has_data()),
            last_sync_date: take(&mut map, "lastSyncDate"),
            theme: map.remove("theme").filter(|v| !v.is_null()),
            thresholds: take::<UsageThresholds>(&mut map, "thresholds")
                .filter(|t| t.validate().is_ok()),
            model_stats: take(&mut map, "modelStats"),
        }
    }

    /// Decodes a document, treating anything unparsable as empty.
    pub fn from_slice(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                warn!(error = %e, "Shared document is not valid JSON, reading as empty");
                Self::default()
            }
        }
    }

    /// The stored credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.oauth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(Credential::token)
    }
}

fn take<T: serde::de::DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(key, error = %e, "Dropping undecodable shared field");
            None
        }
    }
}

impl<'de> Deserialize<'de> for SharedData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// A mutation applied to the shared document.
pub type SharedMutation = Box<dyn FnOnce(&mut SharedData) + Send>;

/// Durable, atomically written, multi-reader shared state.
#[async_trait]
pub trait SharedStateStore: Send + Sync {
    /// Reads the whole document. Never fails.
    async fn load(&self) -> SharedData;

    /// Applies a read-modify-write and persists it atomically.
    async fn update(&self, mutation: SharedMutation) -> Result<(), StoreError>;

    /// Replaces the document with an empty one.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Last good snapshot.
    async fn read(&self) -> Option<CachedState> {
        self.load().await.cached_usage
    }

    /// Stores a snapshot and sets the last sync date to its fetch time.
    async fn write_snapshot(&self, state: &CachedState) -> Result<(), StoreError> {
        let state = state.clone();
        self.update(Box::new(move |data| {
            data.last_sync_date = Some(state.fetched_at);
            data.cached_usage = Some(state);
        }))
        .await
    }

    /// Stored credential.
    async fn read_credential(&self) -> Option<Credential> {
        self.load().await.credential()
    }

    /// Stores or removes the credential.
    async fn write_credential(&self, credential: Option<&Credential>) -> Result<(), StoreError> {
        let token = credential.map(|c| c.expose().to_string());
        self.update(Box::new(move |data| data.oauth_token = token))
            .await
    }

    /// When the last successful sync happened.
    async fn last_sync_date(&self) -> Option<DateTime<Utc>> {
        self.load().await.last_sync_date
    }

    /// Published thresholds, or the defaults.
    async fn thresholds(&self) -> UsageThresholds {
        self.load().await.thresholds.unwrap_or_default()
    }

    /// Publishes thresholds for readers.
    async fn update_thresholds(&self, thresholds: UsageThresholds) -> Result<(), StoreError> {
        thresholds.validate()?;
        self.update(Box::new(move |data| data.thresholds = Some(thresholds)))
            .await
    }

    /// Token totals per model.
    async fn model_stats(&self) -> Vec<ModelTokenStats> {
        self.load().await.model_stats.unwrap_or_default()
    }

    /// Replaces the token totals.
    async fn update_model_stats(&self, stats: Vec<ModelTokenStats>) -> Result<(), StoreError> {
        self.update(Box::new(move |data| data.model_stats = Some(stats)))
            .await
    }

    /// Returns true if a credential is stored.
    async fn is_configured(&self) -> bool {
        self.read_credential().await.is_some()
    }
}

// ============================================================================
// File Store
// ============================================================================

/// Shared state in `<app-support>/com.tokeneater.shared/shared.json`.
#[derive(Debug)]
pub struct FileSharedStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSharedStateStore {
    /// Opens the store at the default location, migrating legacy data.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if legacy data exists but cannot be
    /// copied forward.
    pub async fn open_default() -> Result<Self, StoreError> {
        let base = default_app_support_dir();
        Self::open(
            &base.join(SHARED_DIR_NAME),
            Some(&base.join(LEGACY_SHARED_DIR_NAME)),
        )
        .await
    }

    /// Opens the store in `dir`, migrating from `legacy_dir` when given.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if legacy data exists but cannot be
    /// copied forward.
    pub async fn open(dir: &Path, legacy_dir: Option<&Path>) -> Result<Self, StoreError> {
        if let Some(legacy_dir) = legacy_dir {
            migrate_legacy(legacy_dir, dir, SHARED_FILE_NAME).await?;
        }
        Ok(Self {
            path: dir.join(SHARED_FILE_NAME),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the shared document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_from_disk(&self) -> SharedData {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => SharedData::from_slice(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SharedData::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read shared state");
                SharedData::default()
            }
        }
    }
}

#[async_trait]
impl SharedStateStore for FileSharedStateStore {
    async fn load(&self) -> SharedData {
        self.load_from_disk().await
    }

    #[instrument(skip(self, mutation), fields(path = %self.path.display()))]
    async fn update(&self, mutation: SharedMutation) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_from_disk().await;
        mutation(&mut data);
        save_json(&self.path, &data).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        debug!(path = %self.path.display(), "Clearing shared state");
        save_json(&self.path, &SharedData::default()).await
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-memory shared state for tests.
#[derive(Debug, Default)]
pub struct MemorySharedStateStore {
    data: StdMutex<SharedData>,
}

impl MemorySharedStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `data`.
    pub fn with_data(data: SharedData) -> Self {
        Self {
            data: StdMutex::new(data),
        }
    }
}

#[async_trait]
impl SharedStateStore for MemorySharedStateStore {
    async fn load(&self) -> SharedData {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn update(&self, mutation: SharedMutation) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        mutation(&mut *data);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = SharedData::default();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokeneater_core::{BucketKind, UsageBucket, UsageSnapshot};

    fn cached(pct: f64) -> CachedState {
        CachedState::new(
            UsageSnapshot::new().with_bucket(BucketKind::FiveHour, UsageBucket::new(pct)),
            Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap(),
        )
    }

    async fn open(dir: &tempfile::TempDir) -> FileSharedStateStore {
        FileSharedStateStore::open(&dir.path().join(SHARED_DIR_NAME), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        assert!(store.read().await.is_none());
        assert!(!store.is_configured().await);
        assert_eq!(store.thresholds().await, UsageThresholds::default());
        assert!(store.model_stats().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_snapshot_sets_sync_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        let state = cached(42.0);

        store.write_snapshot(&state).await.unwrap();
        assert_eq!(store.read().await, Some(state.clone()));
        assert_eq!(store.last_sync_date().await, Some(state.fetched_at));
    }

    #[tokio::test]
    async fn test_fields_survive_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        let credential = Credential::token("tok");

        store.write_credential(Some(&credential)).await.unwrap();
        store.write_snapshot(&cached(10.0)).await.unwrap();
        store
            .update_thresholds(UsageThresholds::new(50, 90).unwrap())
            .await
            .unwrap();
        store
            .update_model_stats(vec![ModelTokenStats::new("Opus 4.1", 5)])
            .await
            .unwrap();

        assert_eq!(store.read_credential().await, Some(credential));
        assert!(store.read().await.is_some());
        assert_eq!(store.thresholds().await.warning_percent, 50);
        assert_eq!(store.model_stats().await.len(), 1);

        store.write_credential(None).await.unwrap();
        assert!(!store.is_configured().await);
        assert!(store.read().await.is_some());
    }

    #[tokio::test]
    async fn test_clear_resets_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        store.write_credential(Some(&Credential::token("t"))).await.unwrap();
        store.write_snapshot(&cached(1.0)).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.load().await, SharedData::default());
    }

    #[tokio::test]
    async fn test_invalid_thresholds_rejected() {
        let store = MemorySharedStateStore::new();
        let bad = UsageThresholds {
            warning_percent: 90,
            critical_percent: 80,
        };
        assert!(store.update_thresholds(bad).await.is_err());
    }

    #[test]
    fn test_tolerant_document_decode() {
        let doc = br##"{
            "oauthToken": "tok",
            "cachedUsage": {"usage": "garbage"},
            "lastSyncDate": "2025-06-10T12:00:00Z",
            "theme": {"accent": "#ff0000"},
            "thresholds": {"warningPercent": 95, "criticalPercent": 10},
            "somethingNew": true
        }"##;
        let data = SharedData::from_slice(doc);
        assert_eq!(data.credential(), Some(Credential::token("tok")));
        assert!(data.cached_usage.is_none());
        assert!(data.last_sync_date.is_some());
        assert!(data.theme.is_some());
        assert!(data.thresholds.is_none());

        assert_eq!(SharedData::from_slice(b"{truncated"), SharedData::default());
        assert_eq!(SharedData::from_slice(b"[]"), SharedData::default());
    }

    #[tokio::test]
    async fn test_cached_usage_without_buckets_is_absent() {
        let doc = br#"{
            "oauthToken": "t",
            "cachedUsage": {
                "usage": {"five_hour": {"utilization": "x"}, "seven_day": null},
                "fetchDate": "2025-06-10T12:00:00Z"
            }
        }"#;
        let data = SharedData::from_slice(doc);
        assert!(data.cached_usage.is_none());

        let store = MemorySharedStateStore::with_data(data);
        assert!(store.read().await.is_none());
        assert_eq!(store.read_credential().await, Some(Credential::token("t")));
    }

    #[tokio::test]
    async fn test_open_migrates_legacy() {
        let root = tempfile::tempdir().unwrap();
        let legacy = root.path().join(LEGACY_SHARED_DIR_NAME);
        std::fs::create_dir_all(&legacy).unwrap();
        std::fs::write(legacy.join(SHARED_FILE_NAME), r#"{"oauthToken": "old"}"#).unwrap();

        let store = FileSharedStateStore::open(&root.path().join(SHARED_DIR_NAME), Some(&legacy))
            .await
            .unwrap();
        assert_eq!(store.read_credential().await, Some(Credential::token("old")));
        assert!(!legacy.exists());
    }
}
