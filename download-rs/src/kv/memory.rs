use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::{expiry_millis, KvKey, KvStore, MAX_COUNTER};
use crate::error::{DownloadError, Result};

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    /// Absolute expiry in Unix milliseconds
    expires_at: Option<i64>,
}

impl StoredEntry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process key-value store
///
/// `sum` runs under the map's write lock, so concurrent sums on one key
/// are never lost.
pub struct MemoryKv {
    entries: Arc<RwLock<HashMap<KvKey, StoredEntry>>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl MemoryKv {
    /// Create new store using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create store with a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        MemoryKv {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every operation fails
    /// with `BackendUnavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DownloadError::BackendUnavailable(
                "memory store is offline".to_string(),
            ))
        }
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;

        let initial_count = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        initial_count - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub async fn entry_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &KvKey) -> Result<Option<Value>> {
        self.ensure_available()?;
        let now = self.clock.now_millis();
        let entries = self.entries.read().await;

        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &KvKey, value: Value, expire_in: Option<Duration>) -> Result<()> {
        self.ensure_available()?;
        let expires_at = expiry_millis(self.clock.now_millis(), expire_in);

        let mut entries = self.entries.write().await;
        entries.insert(key.clone(), StoredEntry { value, expires_at });
        debug!("Stored {} (expires_at: {:?})", key, expires_at);

        Ok(())
    }

    async fn sum(&self, key: &KvKey, delta: u64) -> Result<u64> {
        self.ensure_available()?;
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;

        let (current, expires_at) = match entries.get(key).filter(|entry| entry.is_live(now)) {
            Some(entry) => {
                let current = entry.value.as_u64().ok_or_else(|| {
                    DownloadError::InvalidValue(format!("{} does not hold a counter", key))
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let updated = current
            .checked_add(delta)
            .filter(|updated| *updated <= MAX_COUNTER)
            .ok_or_else(|| DownloadError::InvalidValue(format!("counter {} would overflow", key)))?;

        entries.insert(
            key.clone(),
            StoredEntry {
                value: Value::from(updated),
                expires_at,
            },
        );

        Ok(updated)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
