use serde::{Deserialize, Serialize};

/// Download usage for one identity in the current period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadUsage {
    /// Identity
    pub vid: i64,
    /// Downloads recorded so far (absent counter reads as 0)
    pub count: u64,
    /// Maximum downloads per month
    pub limit: u64,
}

impl DownloadUsage {
    /// Check if the monthly limit is reached
    pub fn is_exceeded(&self) -> bool {
        self.count >= self.limit
    }

    /// Get remaining downloads this month
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }
}
