/// Download audit log
///
/// Individual download events are recorded for analytics when running in a
/// hosted deployment. Writing is best effort:
/// - the quota counter never depends on the audit write succeeding
/// - failures are logged, never returned to the caller

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use sqlite::SqliteAuditLog;

use crate::config::AuditConfig;

/// One recorded download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Identity that downloaded
    pub vid: String,
    /// Downloaded book
    pub book_id: String,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
}

impl DownloadRecord {
    pub fn new(vid: i64, book_id: impl Into<String>) -> Self {
        DownloadRecord {
            vid: vid.to_string(),
            book_id: book_id.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Durable writer for download records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist a batch of records
    async fn insert_records(&self, records: Vec<DownloadRecord>) -> Result<()>;
}

/// Decides whether audit records should be written at all
pub type AuditGate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Gate that opens when the environment variable `var` is set,
/// i.e. when running in a hosted deployment
pub fn hosted_environment(var: impl Into<String>) -> AuditGate {
    let var = var.into();
    Arc::new(move || std::env::var_os(&var).is_some())
}

/// Gate with a fixed answer
pub fn fixed_gate(open: bool) -> AuditGate {
    Arc::new(move || open)
}

/// Gate described by the `[audit]` section: closed when disabled,
/// otherwise open only in a hosted deployment
pub fn gate_from_config(config: &AuditConfig) -> AuditGate {
    if config.enabled {
        hosted_environment(config.deployment_env_var.clone())
    } else {
        fixed_gate(false)
    }
}
