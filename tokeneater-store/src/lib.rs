// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TokenEater` Store
//!
//! Durable state for `TokenEater`.
//!
//! This crate provides:
//!
//! - **SharedStateStore**: the cross-process document holding the credential,
//!   the last good snapshot, and published display settings
//! - **SettingsStore**: process-local preferences with change notification
//! - **LevelStore**: last notified level per metric
//! - **Persistence**: atomic JSON writes with owner-only permissions
//!
//! ## Usage
//!
//! ```ignore
//! use tokeneater_store::{FileSharedStateStore, SharedStateStore, SettingsStore};
//!
//! let shared = FileSharedStateStore::open_default().await?;
//! let settings = SettingsStore::load_default().await;
//!
//! if let Some(cached) = shared.read().await {
//!     println!("fetched at {}", cached.fetched_at);
//! }
//!
//! let mut rx = settings.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("Settings updated!");
//! }
//! ```

pub mod error;
pub mod levels;
pub mod migration;
pub mod persistence;
pub mod settings_store;
pub mod shared_state;

pub use error::StoreError;
pub use levels::{FileLevelStore, LevelStore, MemoryLevelStore, level_key};
pub use migration::{MigrationOutcome, migrate_legacy};
pub use persistence::{
    default_app_support_dir, default_config_dir, default_levels_path, default_settings_path,
    ensure_dir, load_json, load_json_or_default, save_json, write_atomic,
};
pub use settings_store::{
    DEFAULT_DISPLAY_INTERVAL_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_STALE_BUDGET_SECS,
    MIN_POLL_INTERVAL_SECS, Settings, SettingsStore,
};
pub use shared_state::{
    FileSharedStateStore, LEGACY_SHARED_DIR_NAME, MemorySharedStateStore, SHARED_DIR_NAME,
    SHARED_FILE_NAME, SharedData, SharedMutation, SharedStateStore,
};

#[cfg(test)]
mod persistence_tests;
