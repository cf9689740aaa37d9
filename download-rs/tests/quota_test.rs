//! Integration tests for download quotas

use download_rs::audit::{fixed_gate, SqliteAuditLog};
use download_rs::kv::{KvStore, MemoryKv, SqliteKv};
use download_rs::{Credential, DownloadConfig, DownloadQuota};
use futures::future::join_all;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

async fn setup_test_db() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

fn config_with_limit(limit: u64) -> DownloadConfig {
    let mut config = DownloadConfig::default();
    config.quota.max_downloads_per_month = limit;
    config
}

async fn record_concurrently(quota: Arc<DownloadQuota>, credential: Credential, n: usize) {
    let tasks = (0..n).map(|i| {
        let quota = Arc::clone(&quota);
        let credential = credential.clone();
        tokio::spawn(async move {
            quota
                .record_consumption(&credential, &format!("book-{}", i))
                .await
        })
    });

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_memory() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let quota = Arc::new(DownloadQuota::new(store, &config_with_limit(1_000)));
    let credential = Credential::new(42, "session");

    record_concurrently(quota.clone(), credential.clone(), 100).await;

    assert_eq!(quota.usage(&credential).await.unwrap().count, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_sqlite() {
    let store = SqliteKv::new(setup_test_db().await);
    store.init_db().await.unwrap();
    let quota = Arc::new(DownloadQuota::new(Arc::new(store), &config_with_limit(1_000)));
    let credential = Credential::new(42, "session");

    record_concurrently(quota.clone(), credential.clone(), 100).await;

    assert_eq!(quota.usage(&credential).await.unwrap().count, 100);
}

#[tokio::test]
async fn test_concurrent_increments_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("download.db").display());
    let store = SqliteKv::connect(&url).await.unwrap();
    let quota = Arc::new(DownloadQuota::new(Arc::new(store), &config_with_limit(1_000)));
    let credential = Credential::new(7, "session");

    record_concurrently(quota.clone(), credential.clone(), 50).await;

    assert_eq!(quota.usage(&credential).await.unwrap().count, 50);
}

#[tokio::test]
async fn test_allowance_follows_counter() {
    let store = SqliteKv::new(setup_test_db().await);
    store.init_db().await.unwrap();
    let quota = DownloadQuota::new(Arc::new(store), &config_with_limit(2));
    let credential = Credential::new(1, "session");

    assert!(quota.check_allowance(&credential).await.unwrap());
    quota.record_consumption(&credential, "a").await.unwrap();
    assert!(quota.check_allowance(&credential).await.unwrap());
    quota.record_consumption(&credential, "b").await.unwrap();
    assert!(!quota.check_allowance(&credential).await.unwrap());

    // Recording past the limit is still counted
    quota.record_consumption(&credential, "c").await.unwrap();
    assert_eq!(quota.usage(&credential).await.unwrap().count, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_check_then_record_overshoot_is_bounded() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let quota = Arc::new(DownloadQuota::new(store, &config_with_limit(5)));
    let credential = Credential::new(9, "session");
    let racers = 20;

    let tasks = (0..racers).map(|_| {
        let quota = Arc::clone(&quota);
        let credential = credential.clone();
        tokio::spawn(async move {
            if quota.check_allowance(&credential).await.unwrap() {
                quota.record_consumption(&credential, "book").await.unwrap();
            }
        })
    });
    join_all(tasks).await;

    let count = quota.usage(&credential).await.unwrap().count;
    assert!(count >= 5);
    assert!(count <= 5 + racers - 1);
}

#[tokio::test]
async fn test_audit_records_written_to_database() {
    let pool = setup_test_db().await;
    let store = SqliteKv::new(pool.clone());
    store.init_db().await.unwrap();

    let audit_log = Arc::new(SqliteAuditLog::new(pool));
    audit_log.init_db().await.unwrap();

    let quota = DownloadQuota::new(Arc::new(store), &config_with_limit(10))
        .with_audit(audit_log.clone(), fixed_gate(true));
    let credential = Credential::new(42, "session");

    quota.record_consumption(&credential, "book42").await.unwrap();

    let mut records = Vec::new();
    for _ in 0..50 {
        records = audit_log.records_for("42").await.unwrap();
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].book_id, "book42");
}

#[tokio::test]
async fn test_missing_audit_table_does_not_fail_download() {
    let pool = setup_test_db().await;
    let store = SqliteKv::new(pool.clone());
    store.init_db().await.unwrap();

    // Audit table never created: every audit write fails
    let audit_log = Arc::new(SqliteAuditLog::new(pool));

    let quota = DownloadQuota::new(Arc::new(store), &config_with_limit(10))
        .with_audit(audit_log, fixed_gate(true));
    let credential = Credential::new(1, "session");

    quota.record_consumption(&credential, "book").await.unwrap();
    quota.record_consumption(&credential, "book").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(quota.usage(&credential).await.unwrap().count, 2);
}
