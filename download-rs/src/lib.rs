//! download-rs: Download quotas and short-lived download secrets
//!
//! Gates book downloads per identity on top of a key-value store that offers
//! atomic addition and per-entry expiry.
//!
//! # Features
//!
//! - **Monthly quota**: per-identity counter, incremented atomically
//! - **Audit log**: best-effort download records in hosted deployments
//! - **Download secrets**: random, reusable tokens valid for 5 minutes
//! - **Backends**: in-memory store and SQLite (`sqlx`)
//!
//! # Example
//!
//! ```no_run
//! use download_rs::kv::SqliteKv;
//! use download_rs::{Credential, DownloadConfig, DownloadQuota, DownloadSecrets};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DownloadConfig::default();
//!     let store = Arc::new(SqliteKv::connect(&config.storage.database_url).await?);
//!
//!     let quota = DownloadQuota::new(store.clone(), &config);
//!     let secrets = DownloadSecrets::new(store, &config);
//!     let credential = Credential::new(42, "session-token");
//!
//!     if quota.check_allowance(&credential).await? {
//!         let secret = secrets.issue(&credential, "book42", &[1, 2, 3]).await?;
//!         let (found, book_id, chapters) =
//!             secrets.use_secret(&credential, &secret).await.into_parts();
//!         assert!(found);
//!         println!("downloading {} chapters {:?}", book_id, chapters);
//!         quota.record_consumption(&credential, &book_id).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`audit`]: Download records and the audit sink
//! - [`config`]: Configuration management
//! - [`credential`]: Caller credential
//! - [`error`]: Error types and handling
//! - [`kv`]: Key-value backends
//! - [`quota`]: Monthly download quota
//! - [`secret`]: Download secrets

pub mod audit;
pub mod config;
pub mod credential;
pub mod error;
pub mod kv;
pub mod quota;
pub mod secret;

// Re-export commonly used types
pub use config::DownloadConfig;
pub use credential::Credential;
pub use error::{DownloadError, Result};
pub use quota::{DownloadQuota, DownloadUsage};
pub use secret::{DownloadSecret, DownloadSecrets, SecretUse};
