//! Integration tests for cross-process visibility of the shared document.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tempfile::TempDir;
use tokeneater_core::{BucketKind, CachedState, Credential, UsageBucket, UsageSnapshot};
use tokeneater_store::{FileSharedStateStore, SharedData, SharedStateStore};
use tokeneater_sync::{EntryProvider, NOT_CONFIGURED};

/// A snapshot whose buckets all carry the same value, so a mix of two writes
/// would be visible.
fn uniform(value: f64) -> CachedState {
    let mut snapshot = UsageSnapshot::new();
    for kind in BucketKind::ALL {
        snapshot.set_bucket(kind, Some(UsageBucket::new(value)));
    }
    CachedState::new(snapshot, Utc::now())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reader_never_sees_torn_document() {
    let dir = TempDir::new().unwrap();
    let shared_dir = dir.path().join("shared");
    let writer = Arc::new(FileSharedStateStore::open(&shared_dir, None).await.unwrap());
    writer.write_snapshot(&uniform(0.0)).await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let path = writer.path().to_path_buf();
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut reads = 0usize;
            while !done.load(Ordering::SeqCst) {
                let bytes = tokio::fs::read(&path).await.unwrap();
                let value: serde_json::Value =
                    serde_json::from_slice(&bytes).expect("document must always parse");
                let data = SharedData::from_value(value);
                let snapshot = data.cached_usage.expect("snapshot present").snapshot;

                let first = snapshot.five_hour.as_ref().unwrap().utilization;
                for kind in BucketKind::ALL {
                    assert_eq!(snapshot.bucket(kind).unwrap().utilization, first);
                }
                reads += 1;
            }
            reads
        })
    };

    for i in 1..=100 {
        writer.write_snapshot(&uniform(f64::from(i % 100))).await.unwrap();
    }
    done.store(true, Ordering::SeqCst);

    assert!(reader.await.unwrap() > 0);
}

#[tokio::test]
async fn test_second_process_reads_what_owner_wrote() {
    let dir = TempDir::new().unwrap();
    let shared_dir = dir.path().join("shared");

    let owner = FileSharedStateStore::open(&shared_dir, None).await.unwrap();
    let reader: Arc<dyn SharedStateStore> =
        Arc::new(FileSharedStateStore::open(&shared_dir, None).await.unwrap());
    let provider = EntryProvider::new(reader);

    assert_eq!(
        provider.latest(Utc::now()).await.error.as_deref(),
        Some(NOT_CONFIGURED)
    );

    owner
        .write_credential(Some(&Credential::token("t")))
        .await
        .unwrap();
    owner.write_snapshot(&uniform(25.0)).await.unwrap();

    let entry = provider.latest(Utc::now()).await;
    assert!(entry.error.is_none());
    assert!(!entry.is_stale);
    assert_eq!(
        entry.snapshot.unwrap().seven_day.unwrap().utilization,
        25.0
    );
}

#[tokio::test]
async fn test_legacy_document_is_migrated_on_open() {
    let dir = TempDir::new().unwrap();
    let legacy = dir.path().join("com.claudeusagewidget.shared");
    let current = dir.path().join("com.tokeneater.shared");
    std::fs::create_dir_all(&legacy).unwrap();
    std::fs::write(legacy.join("shared.json"), r#"{"oauthToken": "old-token"}"#).unwrap();

    let store = FileSharedStateStore::open(&current, Some(&legacy))
        .await
        .unwrap();

    assert_eq!(
        store.read_credential().await,
        Some(Credential::token("old-token"))
    );
    assert!(!legacy.exists());

    // Reopening is a no-op.
    let again = FileSharedStateStore::open(&current, Some(&legacy))
        .await
        .unwrap();
    assert!(again.is_configured().await);
}
