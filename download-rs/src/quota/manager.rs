use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::DownloadUsage;
use crate::audit::{gate_from_config, AuditGate, AuditSink, DownloadRecord};
use crate::config::DownloadConfig;
use crate::credential::Credential;
use crate::error::{DownloadError, Result};
use crate::kv::{KvKey, KvStore};

/// Download quota tracker
///
/// Holds no state of its own: every call is a round trip to the store.
pub struct DownloadQuota {
    store: Arc<dyn KvStore>,
    namespace: String,
    max_downloads: u64,
    audit: Option<Arc<dyn AuditSink>>,
    audit_gate: AuditGate,
}

impl DownloadQuota {
    /// Create new quota tracker without an audit sink
    ///
    /// The audit gate follows `config.audit`; it only matters once a sink
    /// is attached with [`with_audit_sink`](Self::with_audit_sink).
    pub fn new(store: Arc<dyn KvStore>, config: &DownloadConfig) -> Self {
        DownloadQuota {
            store,
            namespace: config.storage.namespace.clone(),
            max_downloads: config.quota.max_downloads_per_month,
            audit: None,
            audit_gate: gate_from_config(&config.audit),
        }
    }

    /// Attach an audit sink, gated by the configuration's `[audit]` section
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Attach an audit sink; records are written only while `gate` returns true
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>, gate: AuditGate) -> Self {
        self.audit = Some(sink);
        self.audit_gate = gate;
        self
    }

    pub fn max_downloads(&self) -> u64 {
        self.max_downloads
    }

    fn counter_key(&self, credential: &Credential) -> KvKey {
        KvKey::new(self.namespace.as_str()).push(credential.vid)
    }

    /// Raw counter; `None` when no download was ever recorded
    async fn read_count(&self, credential: &Credential) -> Result<Option<u64>> {
        let key = self.counter_key(credential);

        match self.store.get(&key).await? {
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                DownloadError::InvalidValue(format!("{} does not hold a counter", key))
            }),
            None => Ok(None),
        }
    }

    /// Check if the identity may download again this month
    ///
    /// Advisory only: a concurrent caller may consume the last download
    /// between this check and `record_consumption`.
    pub async fn check_allowance(&self, credential: &Credential) -> Result<bool> {
        let allowed = match self.read_count(credential).await? {
            None => true,
            Some(count) => count < self.max_downloads,
        };

        if !allowed {
            warn!(
                "Download quota exceeded for vid {} ({} per month)",
                credential.vid, self.max_downloads
            );
        }

        Ok(allowed)
    }

    /// Get current usage for an identity
    pub async fn usage(&self, credential: &Credential) -> Result<DownloadUsage> {
        let count = self.read_count(credential).await?.unwrap_or(0);

        Ok(DownloadUsage {
            vid: credential.vid,
            count,
            limit: self.max_downloads,
        })
    }

    /// Record one download of `book_id`
    ///
    /// The counter increment is the only guaranteed effect. The audit record,
    /// when enabled, is written by a detached task whose failure is only logged.
    pub async fn record_consumption(&self, credential: &Credential, book_id: &str) -> Result<()> {
        self.record_consumption_tracked(credential, book_id)
            .await
            .map(drop)
    }

    /// Same as [`record_consumption`](Self::record_consumption), but returns
    /// the handle of the audit task, if one was started
    ///
    /// Short-lived processes await the handle so the record is written before
    /// the runtime shuts down. The task never fails; awaiting only waits.
    pub async fn record_consumption_tracked(
        &self,
        credential: &Credential,
        book_id: &str,
    ) -> Result<Option<JoinHandle<()>>> {
        let key = self.counter_key(credential);
        let count = self.store.sum(&key, 1).await?;
        debug!("Download count for vid {} is now {}", credential.vid, count);

        let handle = match &self.audit {
            Some(sink) if (self.audit_gate)() => Some(spawn_audit(
                Arc::clone(sink),
                DownloadRecord::new(credential.vid, book_id),
            )),
            _ => None,
        };

        Ok(handle)
    }
}

fn spawn_audit(sink: Arc<dyn AuditSink>, record: DownloadRecord) -> JoinHandle<()> {
    tokio::spawn(async move {
        let vid = record.vid.clone();
        let book_id = record.book_id.clone();

        match sink.insert_records(vec![record]).await {
            Ok(()) => info!("Recorded download of {} by vid {}", book_id, vid),
            Err(e) => warn!(
                "Failed to record download of {} by vid {}: {}",
                book_id, vid, e
            ),
        }
    })
}
