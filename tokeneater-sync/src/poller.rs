//! Background poll loop.
//!
//! Refreshes immediately, then once per polling interval. Settings changes
//! are debounced and then trigger a credential resync and an early refresh.
//! Cancelling the handle stops the loop; a fetch already in flight finishes
//! but its result is not applied.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::timer::{CoalescingTimer, DEFAULT_QUIET_PERIOD};

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Asks the loop to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Poll loop ended abnormally");
        }
    }
}

/// Poll loop options.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Overrides the interval from settings.
    pub interval: Option<Duration>,
    /// Quiet period before a settings change takes effect.
    pub settings_quiet_period: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: None,
            settings_quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// Spawns the poll loop on the current runtime.
pub fn spawn_poller(engine: Arc<SyncEngine>, config: PollerConfig) -> PollHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(engine, config, cancel.clone()));
    PollHandle { cancel, task }
}

async fn run(engine: Arc<SyncEngine>, config: PollerConfig, cancel: CancellationToken) {
    info!("Starting poll loop");

    let wake = Arc::new(Notify::new());
    let debounce = CoalescingTimer::new(config.settings_quiet_period);
    let mut settings_rx = engine.settings().subscribe();
    let mut reload = false;

    'poll: loop {
        if reload {
            engine.resync_credentials().await;
            reload = false;
        }

        match engine.refresh_with(&cancel).await {
            Ok(_) => {}
            Err(SyncError::Cancelled) => break,
            Err(e) if e.is_transient() => debug!(error = %e, "Transient sync failure"),
            Err(e) => warn!(error = %e, "Sync failed"),
        }

        let interval = match config.interval {
            Some(interval) => interval,
            None => engine.settings().poll_interval().await,
        };
        let deadline = Instant::now() + interval;
        debug!(secs = interval.as_secs(), "Sleeping until next refresh");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break 'poll,
                () = wake.notified() => {
                    reload = true;
                    break;
                }
                Ok(()) = settings_rx.changed() => {
                    let wake = Arc::clone(&wake);
                    debounce.trigger(move || async move { wake.notify_one() });
                }
                () = tokio::time::sleep_until(deadline) => break,
            }
        }
    }

    debounce.cancel();
    info!("Poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokeneater_core::{BucketKind, Credential, UsageBucket, UsageSnapshot};
    use tokeneater_fetch::{MemoryCredentialSource, ScriptedResponse, ScriptedUsageClient};
    use tokeneater_store::{MemorySharedStateStore, SettingsStore, SharedStateStore};

    fn setup(client: ScriptedUsageClient) -> (Arc<SyncEngine>, Arc<ScriptedUsageClient>) {
        let token = Credential::token("t");
        let source = Arc::new(MemoryCredentialSource::with_credential(token.clone()));
        let client = Arc::new(client);
        client.respond(
            &token,
            ScriptedResponse::Snapshot(
                UsageSnapshot::new().with_bucket(BucketKind::FiveHour, UsageBucket::new(5.0)),
            ),
        );
        let engine = SyncEngine::builder(
            source,
            client.clone(),
            Arc::new(MemorySharedStateStore::new()),
        )
        .settings(SettingsStore::new(
            std::env::temp_dir().join("tokeneater-poller-unit/settings.json"),
        ))
        .without_model_stats()
        .build();
        (Arc::new(engine), client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval_until_cancelled() {
        let (engine, client) = setup(ScriptedUsageClient::new());
        let handle = spawn_poller(engine, PollerConfig::default());

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(client.calls(), 3);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_override() {
        let (engine, client) = setup(ScriptedUsageClient::new());
        let config = PollerConfig {
            interval: Some(Duration::from_secs(10)),
            ..PollerConfig::default()
        };
        let handle = spawn_poller(engine, config);

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(client.calls(), 4);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_in_flight_result() {
        let (engine, client) =
            setup(ScriptedUsageClient::new().with_delay(Duration::from_secs(5)));
        let handle = spawn_poller(engine.clone(), PollerConfig::default());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(client.calls(), 1);
        handle.shutdown().await;

        assert!(engine.shared().read().await.is_none());
    }
}
