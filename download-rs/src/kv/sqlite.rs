//! SQLite-backed key-value store
//!
//! Entries live in a single `kv_entries` table. Expiry is stored as an
//! absolute timestamp and checked on every read; `sum` is a single upsert
//! statement, which SQLite executes atomically.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::{expiry_millis, KvKey, KvStore};
use crate::error::{DownloadError, Result};

/// SQLite key-value store
pub struct SqliteKv {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteKv {
    /// Create a store over an existing pool
    pub fn new(db: SqlitePool) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Create a store with a custom clock
    pub fn with_clock(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Open (creating if missing) the database at `database_url` and
    /// initialize the schema
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // In-memory databases are per connection
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self::new(db);
        store.init_db().await?;
        info!("Opened key-value store at {}", database_url);
        Ok(store)
    }

    /// Initialize database tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries(expires_at)",
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Underlying pool, for collaborators sharing the database
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Delete expired rows, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(self.clock.now_millis())
                .execute(&self.db)
                .await?;

        let removed = result.rows_affected();
        debug!("Purged {} expired entries", removed);
        Ok(removed)
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &KvKey) -> Result<Option<Value>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT value FROM kv_entries
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(key.to_string())
        .bind(self.clock.now_millis())
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some((raw,)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &KvKey, value: Value, expire_in: Option<Duration>) -> Result<()> {
        let expires_at = expiry_millis(self.clock.now_millis(), expire_in);

        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key.to_string())
        .bind(serde_json::to_string(&value)?)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        debug!("Stored {} (expires_at: {:?})", key, expires_at);
        Ok(())
    }

    async fn sum(&self, key: &KvKey, delta: u64) -> Result<u64> {
        let delta = i64::try_from(delta)
            .map_err(|_| DownloadError::InvalidValue(format!("delta {} out of range", delta)))?;
        let now = self.clock.now_millis();

        // An expired row is treated as absent: the counter restarts at `delta`.
        // A live row is only updated when it holds a non-negative JSON integer
        // with room for `delta`; otherwise nothing is written and no row returned.
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES (?, ?, NULL)
            ON CONFLICT(key) DO UPDATE SET
                value = CASE
                    WHEN expires_at IS NOT NULL AND expires_at <= ? THEN excluded.value
                    ELSE CAST(value AS INTEGER) + CAST(excluded.value AS INTEGER)
                END,
                expires_at = CASE
                    WHEN expires_at IS NOT NULL AND expires_at <= ? THEN NULL
                    ELSE expires_at
                END
            WHERE (expires_at IS NOT NULL AND expires_at <= ?)
                OR (
                    CASE WHEN json_valid(value) THEN json_type(value) = 'integer' ELSE 0 END
                    AND CAST(value AS INTEGER) >= 0
                    AND CAST(value AS INTEGER) <= ?
                )
            RETURNING CAST(value AS INTEGER)
            "#,
        )
        .bind(key.to_string())
        .bind(delta)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(i64::MAX - delta)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some((updated,)) => u64::try_from(updated).map_err(|_| {
                DownloadError::InvalidValue(format!("{} does not hold a counter", key))
            }),
            None => match self.get(key).await? {
                Some(value) if value.is_u64() => Err(DownloadError::InvalidValue(format!(
                    "counter {} would overflow",
                    key
                ))),
                _ => Err(DownloadError::InvalidValue(format!(
                    "{} does not hold a counter",
                    key
                ))),
            },
        }
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}
