//! Integration tests for download secrets

use download_rs::kv::{ManualClock, SqliteKv};
use download_rs::{Credential, DownloadConfig, DownloadSecrets, SecretUse};
use sqlx::sqlite::SqlitePoolOptions;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

async fn setup_store(clock: Arc<ManualClock>) -> Arc<SqliteKv> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteKv::with_clock(pool, clock);
    store.init_db().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_issue_and_verify() {
    let store = setup_store(Arc::new(ManualClock::starting_now())).await;
    let secrets = DownloadSecrets::new(store, &DownloadConfig::default());
    let credential = Credential::new(42, "session-token");

    let secret = secrets
        .issue(&credential, "book42", &[1, 2, 3])
        .await
        .unwrap();

    let (found, book_id, chapters) = secrets.use_secret(&credential, &secret).await.into_parts();
    assert!(found);
    assert_eq!(book_id, "book42");
    assert_eq!(chapters, vec![1, 2, 3]);

    // Multi-use: same answer again
    let again = secrets.use_secret(&credential, &secret).await;
    assert_eq!(again.into_parts(), (true, book_id, chapters));
}

#[tokio::test]
async fn test_never_issued_secret() {
    let store = setup_store(Arc::new(ManualClock::new(0))).await;
    let secrets = DownloadSecrets::new(store, &DownloadConfig::default());

    let used = secrets
        .use_secret(&Credential::new(1, "session"), "00000000-0000-0000-0000-000000000000")
        .await;
    assert_eq!(used, SecretUse::not_found());
    assert_eq!(used.into_parts(), (false, String::new(), vec![]));
}

#[tokio::test]
async fn test_secret_expires_after_five_minutes() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let store = setup_store(clock.clone()).await;
    let secrets = DownloadSecrets::new(store.clone(), &DownloadConfig::default());
    let credential = Credential::new(1, "session");

    let secret = secrets.issue(&credential, "book", &[1]).await.unwrap();

    clock.advance(Duration::from_secs(4 * 60 + 59));
    assert!(secrets.use_secret(&credential, &secret).await.found);

    clock.advance(Duration::from_secs(1));
    assert_eq!(
        secrets.use_secret(&credential, &secret).await,
        SecretUse::not_found()
    );
    assert!(secrets.lookup(&credential, &secret).await.unwrap().is_none());

    assert_eq!(store.purge_expired().await.unwrap(), 1);
}

#[tokio::test]
async fn test_secret_not_visible_to_other_identity() {
    let store = setup_store(Arc::new(ManualClock::new(0))).await;
    let secrets = DownloadSecrets::new(store, &DownloadConfig::default());
    let a = Credential::new(1, "session-a");
    let b = Credential::new(2, "session-b");

    let secret = secrets.issue(&a, "book", &[1, 2]).await.unwrap();

    assert!(!secrets.use_secret(&b, &secret).await.found);
    assert!(secrets.use_secret(&a, &secret).await.found);
}

#[tokio::test]
async fn test_identical_requests_give_distinct_secrets() {
    let store = setup_store(Arc::new(ManualClock::new(0))).await;
    let secrets = DownloadSecrets::new(store, &DownloadConfig::default());
    let credential = Credential::new(1, "session");

    let first = secrets.issue(&credential, "book42", &[1, 2, 3]).await.unwrap();
    let second = secrets.issue(&credential, "book42", &[1, 2, 3]).await.unwrap();
    assert_ne!(first, second);

    for secret in [&first, &second] {
        let used = secrets.use_secret(&credential, secret).await;
        assert_eq!(used.into_parts(), (true, "book42".to_string(), vec![1, 2, 3]));
    }
}

#[tokio::test]
async fn test_ttl_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[secret]\nttl_seconds = 10").unwrap();
    let config = DownloadConfig::from_file(file.path()).unwrap();

    let clock = Arc::new(ManualClock::new(0));
    let store = setup_store(clock.clone()).await;
    let secrets = DownloadSecrets::new(store, &config);
    let credential = Credential::new(1, "session");

    let secret = secrets.issue(&credential, "book", &[1]).await.unwrap();
    clock.advance(Duration::from_secs(9));
    assert!(secrets.use_secret(&credential, &secret).await.found);
    clock.advance(Duration::from_secs(1));
    assert!(!secrets.use_secret(&credential, &secret).await.found);
}

#[tokio::test]
async fn test_backend_failure_collapses_to_not_found() {
    let store = setup_store(Arc::new(ManualClock::new(0))).await;
    let secrets = DownloadSecrets::new(store.clone(), &DownloadConfig::default());
    let credential = Credential::new(1, "session");
    let secret = secrets.issue(&credential, "book", &[1]).await.unwrap();

    store.pool().close().await;

    assert_eq!(
        secrets.use_secret(&credential, &secret).await,
        SecretUse::not_found()
    );
    assert!(secrets
        .lookup(&credential, &secret)
        .await
        .unwrap_err()
        .is_backend_unavailable());
    assert!(secrets
        .issue(&credential, "book", &[1])
        .await
        .unwrap_err()
        .is_backend_unavailable());
}
