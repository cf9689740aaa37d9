/// Monthly download quota per identity
///
/// Counters live in the key-value store under `[namespace, vid]` and are only
/// ever changed through the store's atomic `sum`.
///
/// `check_allowance` followed by `record_consumption` is not atomic: with N
/// callers racing on the same identity the counter can end up at most
/// N - 1 above the configured maximum.

pub mod manager;
pub mod types;

pub use manager::DownloadQuota;
pub use types::DownloadUsage;
