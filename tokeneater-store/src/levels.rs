//! Last notified level per metric.
//!
//! Process-local. Keeps level transitions from being announced again after a
//! restart.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokeneater_core::{MetricId, UsageLevel};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::persistence::{default_levels_path, load_json_or_default, save_json};

/// Persisted key for a metric.
pub fn level_key(metric: MetricId) -> String {
    format!("lastLevel_{}", metric.key())
}

/// Storage for the last notified level of each metric.
#[async_trait]
pub trait LevelStore: Send + Sync {
    /// Last level, `Green` if never recorded.
    async fn last_level(&self, metric: MetricId) -> UsageLevel;

    /// Records a level.
    async fn set_last_level(&self, metric: MetricId, level: UsageLevel) -> Result<(), StoreError>;

    /// Forgets every level.
    async fn clear(&self) -> Result<(), StoreError>;
}

// ============================================================================
// File Store
// ============================================================================

/// Levels in `levels.json`, cached in memory.
#[derive(Debug)]
pub struct FileLevelStore {
    path: PathBuf,
    levels: Mutex<BTreeMap<String, UsageLevel>>,
}

impl FileLevelStore {
    /// Opens the store at the default path.
    pub async fn open_default() -> Self {
        Self::open(default_levels_path()).await
    }

    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub async fn open(path: PathBuf) -> Self {
        let levels: BTreeMap<String, UsageLevel> = load_json_or_default(&path).await;
        debug!(path = %path.display(), count = levels.len(), "Notification levels loaded");
        Self {
            path,
            levels: Mutex::new(levels),
        }
    }
}

#[async_trait]
impl LevelStore for FileLevelStore {
    async fn last_level(&self, metric: MetricId) -> UsageLevel {
        self.levels
            .lock()
            .await
            .get(&level_key(metric))
            .copied()
            .unwrap_or_default()
    }

    async fn set_last_level(&self, metric: MetricId, level: UsageLevel) -> Result<(), StoreError> {
        let mut levels = self.levels.lock().await;
        if levels.get(&level_key(metric)) == Some(&level) {
            return Ok(());
        }
        levels.insert(level_key(metric), level);
        save_json(&self.path, &*levels).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut levels = self.levels.lock().await;
        levels.clear();
        save_json(&self.path, &*levels).await
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-memory levels for tests.
#[derive(Debug, Default)]
pub struct MemoryLevelStore {
    levels: StdMutex<HashMap<MetricId, UsageLevel>>,
}

impl MemoryLevelStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LevelStore for MemoryLevelStore {
    async fn last_level(&self, metric: MetricId) -> UsageLevel {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&metric)
            .copied()
            .unwrap_or_default()
    }

    async fn set_last_level(&self, metric: MetricId, level: UsageLevel) -> Result<(), StoreError> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metric, level);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_levels_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.json");

        let store = FileLevelStore::open(path.clone()).await;
        assert_eq!(store.last_level(MetricId::FiveHour).await, UsageLevel::Green);
        store
            .set_last_level(MetricId::FiveHour, UsageLevel::Red)
            .await
            .unwrap();

        let reopened = FileLevelStore::open(path.clone()).await;
        assert_eq!(reopened.last_level(MetricId::FiveHour).await, UsageLevel::Red);
        assert_eq!(reopened.last_level(MetricId::SevenDay).await, UsageLevel::Green);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["lastLevel_fiveHour"], "red");
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLevelStore::open(dir.path().join("levels.json")).await;
        store
            .set_last_level(MetricId::Sonnet, UsageLevel::Orange)
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.last_level(MetricId::Sonnet).await, UsageLevel::Green);
    }
}
