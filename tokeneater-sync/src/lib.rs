// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TokenEater` Sync
//!
//! The sync owner's side of `TokenEater`: refresh cycles with credential
//! recovery, the background poll loop, and threshold alerts.
//!
//! ## Components
//!
//! - [`SyncEngine`] - fetch, cache, recover from rejected credentials, alert
//! - [`spawn_poller`] - cancellable periodic refresh with debounced reloads
//! - [`NotificationEngine`] - edge-triggered level alerts per metric
//! - [`EntryProvider`] - read-only entries for display surfaces
//! - [`CoalescingTimer`] - cancel-and-reschedule delayed actions
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokeneater_fetch::{AnthropicUsageClient, ClaudeCredentialSource};
//! use tokeneater_store::{FileSharedStateStore, SettingsStore};
//! use tokeneater_sync::{PollerConfig, SyncEngine, spawn_poller};
//!
//! let engine = SyncEngine::builder(
//!     Arc::new(ClaudeCredentialSource::new()),
//!     Arc::new(AnthropicUsageClient::new()),
//!     Arc::new(FileSharedStateStore::open_default().await?),
//! )
//! .settings(SettingsStore::load_default().await)
//! .build();
//!
//! let handle = spawn_poller(Arc::new(engine), PollerConfig::default());
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown().await;
//! ```

pub mod engine;
pub mod entry;
pub mod error;
pub mod format;
pub mod notifications;
pub mod poller;
pub mod timer;

pub use engine::{CachedUsage, SyncEngine, SyncEngineBuilder};
pub use entry::{DisplayEntry, EntryProvider, NO_DATA, NOT_CONFIGURED};
pub use error::{ErrorState, SyncError};
pub use format::format_countdown;
pub use notifications::{
    Alert, AlertKind, LogNotifier, NotificationEngine, Notifier, RecordingNotifier, SystemNotifier,
};
pub use poller::{PollHandle, PollerConfig, spawn_poller};
pub use timer::CoalescingTimer;
