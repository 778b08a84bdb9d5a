//! Integration tests for the credential recovery protocol.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokeneater_core::{BucketKind, Credential, ProxyConfig, UsageBucket, UsageSnapshot};
use tokeneater_fetch::{MemoryCredentialSource, ScriptedResponse, ScriptedUsageClient};
use tokeneater_store::{FileSharedStateStore, SettingsStore, SharedStateStore};
use tokeneater_sync::{ErrorState, SyncEngine, SyncError};
use tokio_util::sync::CancellationToken;

struct Harness {
    _dir: TempDir,
    source: Arc<MemoryCredentialSource>,
    client: Arc<ScriptedUsageClient>,
    shared: Arc<FileSharedStateStore>,
    engine: Arc<SyncEngine>,
}

async fn harness(client: ScriptedUsageClient) -> Harness {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemoryCredentialSource::new());
    let client = Arc::new(client);
    let shared = Arc::new(
        FileSharedStateStore::open(&dir.path().join("shared"), None)
            .await
            .unwrap(),
    );
    let engine = SyncEngine::builder(source.clone(), client.clone(), shared.clone())
        .settings(SettingsStore::new(dir.path().join("settings.json")))
        .without_model_stats()
        .build();
    Harness {
        _dir: dir,
        source,
        client,
        shared,
        engine: Arc::new(engine),
    }
}

fn usage(pct: f64) -> ScriptedResponse {
    ScriptedResponse::Snapshot(
        UsageSnapshot::new().with_bucket(BucketKind::FiveHour, UsageBucket::new(pct)),
    )
}

// ============================================================================
// Bounded Retry
// ============================================================================

#[tokio::test]
async fn test_dead_credential_is_sent_once() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    h.source.set(Some(a.clone()));
    h.client.respond(&a, ScriptedResponse::AuthFailure(401));

    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));
    assert_eq!(h.client.calls(), 1);

    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));
    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));
    assert_eq!(h.client.calls(), 1);
    assert_eq!(h.engine.error_state(), ErrorState::TokenExpired);
}

#[tokio::test]
async fn test_rotated_credential_is_adopted_and_retried_once() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    let b = Credential::token("b");
    h.source.set(Some(a.clone()));
    h.client.respond(&a, ScriptedResponse::AuthFailure(401));
    h.client.respond(&b, usage(33.0));

    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));

    h.source.set(Some(b.clone()));
    let state = h.engine.refresh().await.unwrap();

    assert_eq!(h.client.calls_for(&a), 1);
    assert_eq!(h.client.calls_for(&b), 1);
    assert_eq!(state.snapshot.five_hour.unwrap().utilization, 33.0);
    assert_eq!(h.shared.read_credential().await, Some(b));
    assert!(h.shared.read().await.is_some());
    assert!(h.engine.error_state().is_none());
}

#[tokio::test]
async fn test_rotation_during_recovery_retries_in_same_cycle() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    let b = Credential::token("b");
    h.shared.write_credential(Some(&a)).await.unwrap();
    h.source.set(Some(b.clone()));
    h.client.respond(&a, ScriptedResponse::AuthFailure(403));
    h.client.respond(&b, usage(5.0));

    h.engine.refresh().await.unwrap();

    assert_eq!(h.client.calls(), 2);
    assert_eq!(h.shared.read_credential().await, Some(b));
}

#[tokio::test]
async fn test_failed_retry_does_not_loop() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    let b = Credential::token("b");
    h.shared.write_credential(Some(&a)).await.unwrap();
    h.source.set(Some(b.clone()));

    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));
    assert_eq!(h.client.calls(), 2);

    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));
    assert_eq!(h.client.calls(), 2);
}

// ============================================================================
// Vault Locked
// ============================================================================

#[tokio::test]
async fn test_locked_vault_during_recovery_is_not_sticky() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    h.shared.write_credential(Some(&a)).await.unwrap();
    h.source.set_locked(true);
    h.client.respond(&a, ScriptedResponse::AuthFailure(401));

    assert_eq!(h.engine.refresh().await, Err(SyncError::VaultLocked));
    assert_eq!(h.engine.error_state(), ErrorState::VaultLocked);

    // Nothing was marked dead, so the next tick tries the network again.
    assert_eq!(h.engine.refresh().await, Err(SyncError::VaultLocked));
    assert_eq!(h.client.calls(), 2);

    h.source.set_locked(false);
    h.source.set(Some(Credential::token("b")));
    h.client.respond(&Credential::token("b"), usage(1.0));
    assert!(h.engine.refresh().await.is_ok());
}

// ============================================================================
// Transient Failures
// ============================================================================

#[tokio::test]
async fn test_transient_errors_keep_cache_and_credential() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    h.source.set(Some(a.clone()));
    h.client.respond(&a, usage(20.0));
    let first = h.engine.refresh().await.unwrap();

    h.client.respond(&a, ScriptedResponse::Http(503));
    let err = h.engine.refresh().await.unwrap_err();
    assert_eq!(err, SyncError::Http(503));
    assert!(err.is_transient());

    h.client.respond(&a, ScriptedResponse::Malformed);
    assert!(matches!(
        h.engine.refresh().await,
        Err(SyncError::MalformedResponse(_))
    ));

    assert_eq!(h.shared.read().await, Some(first));
    assert_eq!(h.shared.read_credential().await, Some(a.clone()));
    assert_eq!(h.source.silent_reads(), 1);

    h.client.respond(&a, usage(21.0));
    assert!(h.engine.refresh().await.is_ok());
}

#[tokio::test]
async fn test_reload_config_clears_sticky_failure() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    h.source.set(Some(a.clone()));
    h.client.respond(&a, ScriptedResponse::AuthFailure(401));
    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));

    // The server starts accepting the same token again.
    h.client.respond(&a, usage(50.0));
    assert_eq!(h.engine.refresh().await, Err(SyncError::AuthFailure));
    assert!(h.engine.reload_config().await.is_ok());
    assert_eq!(h.client.calls_for(&a), 2);
}

#[tokio::test]
async fn test_proxy_settings_reach_the_client() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    h.source.set(Some(a.clone()));
    h.client.respond(&a, usage(1.0));

    h.engine.refresh().await.unwrap();
    h.engine
        .settings()
        .set_proxy(ProxyConfig::socks5("10.1.1.1", 1080))
        .await
        .unwrap();
    h.engine.refresh().await.unwrap();

    let proxies = h.client.proxies();
    assert_eq!(proxies[0], None);
    assert_eq!(proxies[1], Some(ProxyConfig::socks5("10.1.1.1", 1080)));
}

// ============================================================================
// Cancellation and Sign Out
// ============================================================================

#[tokio::test]
async fn test_cancelled_refresh_applies_nothing() {
    let h = harness(ScriptedUsageClient::new().with_delay(Duration::from_millis(200))).await;
    let a = Credential::token("a");
    h.shared.write_credential(Some(&a)).await.unwrap();
    h.client.respond(&a, usage(10.0));

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let engine = Arc::clone(&h.engine);
        let cancel = cancel.clone();
        async move { engine.refresh_with(&cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap(), Err(SyncError::Cancelled));
    assert_eq!(h.client.calls(), 1);
    assert!(h.shared.read().await.is_none());
}

#[tokio::test]
async fn test_sign_out_clears_everything() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    h.source.set(Some(a.clone()));
    h.client.respond(&a, usage(10.0));
    h.engine.refresh().await.unwrap();

    h.engine.sign_out().await.unwrap();

    assert!(h.shared.read().await.is_none());
    assert!(h.shared.read_credential().await.is_none());
    assert!(h.engine.error_state().is_none());
}

#[tokio::test]
async fn test_connect_interactive_and_check() {
    let h = harness(ScriptedUsageClient::new()).await;
    let a = Credential::token("a");
    h.client.respond(&a, usage(42.0));

    assert_eq!(
        h.engine.connect_interactive().await.unwrap_err(),
        SyncError::NoCredential
    );

    h.source.set(Some(a.clone()));
    let result = h.engine.connect_interactive().await.unwrap();
    assert!(result.success);
    assert!(result.message.contains("42%"));
    assert_eq!(h.source.interactive_reads(), 2);
    assert_eq!(h.shared.read_credential().await, Some(a));

    assert!(h.engine.test_connection().await.unwrap().success);
}
