//! Short-lived download secrets
//!
//! A secret authorizes one book and a list of its chapters. It is bound to
//! the issuing credential's session token, may be presented any number of
//! times, and stops resolving once its TTL (5 minutes by default) has passed.
//! Expiry is left entirely to the key-value store.

pub mod manager;
pub mod types;

pub use manager::DownloadSecrets;
pub use types::{DownloadSecret, SecretUse};
