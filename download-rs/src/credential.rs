use serde::{Deserialize, Serialize};

/// Caller credential
///
/// Only used as a source of key components: `vid` scopes quota counters,
/// `token` scopes download secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Stable numeric identity
    pub vid: i64,
    /// Stable per-session token
    pub token: String,
}

impl Credential {
    pub fn new(vid: i64, token: impl Into<String>) -> Self {
        Credential {
            vid,
            token: token.into(),
        }
    }
}
