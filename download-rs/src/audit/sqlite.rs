//! SQLite audit log for download records

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use super::{AuditSink, DownloadRecord};

/// Audit log writing to the `download_records` table
pub struct SqliteAuditLog {
    db: SqlitePool,
}

impl SqliteAuditLog {
    /// Create a new audit log
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Initialize database tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS download_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vid TEXT NOT NULL,
                book_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_download_records_vid ON download_records(vid)")
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Records for one identity, oldest first
    pub async fn records_for(&self, vid: &str) -> Result<Vec<DownloadRecord>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT vid, book_id, timestamp FROM download_records WHERE vid = ? ORDER BY id",
        )
        .bind(vid)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(vid, book_id, timestamp)| DownloadRecord {
                vid,
                book_id,
                timestamp,
            })
            .collect())
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn insert_records(&self, records: Vec<DownloadRecord>) -> Result<()> {
        let mut tx = self.db.begin().await?;

        for record in &records {
            sqlx::query("INSERT INTO download_records (vid, book_id, timestamp) VALUES (?, ?, ?)")
                .bind(&record.vid)
                .bind(&record.book_id)
                .bind(record.timestamp)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Inserted {} download record(s)", records.len());
        Ok(())
    }
}
