//! CLI command implementations.

pub mod check;
pub mod config;
pub mod signout;
pub mod status;
pub mod sync;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokeneater_fetch::{AnthropicUsageClient, ClaudeCredentialSource};
use tokeneater_store::{FileLevelStore, FileSharedStateStore, SettingsStore};
use tokeneater_sync::{SyncEngine, SystemNotifier};

/// Opens the shared state at its default location.
pub async fn open_shared() -> Result<Arc<FileSharedStateStore>> {
    let store = FileSharedStateStore::open_default()
        .await
        .context("Failed to open shared state")?;
    Ok(Arc::new(store))
}

/// Builds a sync engine over the production stores and host APIs.
pub async fn open_engine() -> Result<SyncEngine> {
    let shared = open_shared().await?;
    let settings = SettingsStore::load_default().await;
    let levels = FileLevelStore::open_default().await;

    Ok(SyncEngine::builder(
        Arc::new(ClaudeCredentialSource::new()),
        Arc::new(AnthropicUsageClient::new()),
        shared,
    )
    .settings(settings)
    .levels(Arc::new(levels))
    .notifier(Arc::new(SystemNotifier))
    .build())
}
