//! Key-value backend abstraction
//!
//! Quota counters and download secrets live in a key-value store that offers:
//! - point reads and writes of JSON values
//! - per-entry expiry (TTL), after which an entry is no longer readable
//! - an atomic `sum` that is linearizable per key
//!
//! Two backends are provided:
//! - [`MemoryKv`]: in-process store, used for tests and embedding
//! - [`SqliteKv`]: SQLite-backed store via `sqlx`

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

pub mod clock;
pub mod memory;
pub mod sqlite;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

/// One segment of a [`KvKey`]
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum KeyPart {
    Str(String),
    Int(i64),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

/// Ordered sequence of string/number segments identifying an entry
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct KvKey(Vec<KeyPart>);

impl KvKey {
    /// Start a key with its namespace segment
    pub fn new(namespace: impl Into<KeyPart>) -> Self {
        KvKey(vec![namespace.into()])
    }

    /// Append a segment
    pub fn push(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }
}

/// Encodes as a JSON array, e.g. `["download",42]`, so that string
/// segments containing separators can never collide with other keys.
impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match part {
                KeyPart::Str(s) => write!(f, "{}", Value::String(s.clone()))?,
                KeyPart::Int(n) => write!(f, "{}", n)?,
            }
        }
        write!(f, "]")
    }
}

/// Key-value store contract
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the live value at `key`; `None` when absent or expired
    async fn get(&self, key: &KvKey) -> Result<Option<Value>>;

    /// Write `value` at `key`, replacing any previous value.
    /// With `expire_in`, the entry becomes unreadable once that much time has passed.
    async fn set(&self, key: &KvKey, value: Value, expire_in: Option<Duration>) -> Result<()>;

    /// Atomically add `delta` to the unsigned counter at `key` (absent counts as 0)
    /// and return the new value.
    ///
    /// Fails with `InvalidValue`, leaving the entry untouched, when `key` holds
    /// something other than a counter or the result would exceed [`MAX_COUNTER`].
    async fn sum(&self, key: &KvKey, delta: u64) -> Result<u64>;

    /// Get backend name
    fn backend_name(&self) -> &str;
}

/// Largest value a counter may reach; every backend stores counters as `i64`
pub const MAX_COUNTER: u64 = i64::MAX as u64;

/// Absolute expiry in milliseconds for an entry written at `now_millis`
pub(crate) fn expiry_millis(now_millis: i64, expire_in: Option<Duration>) -> Option<i64> {
    expire_in.map(|ttl| now_millis.saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64))
}
