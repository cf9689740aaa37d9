use serde::{Deserialize, Serialize};

/// Payload stored behind a download secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSecret {
    /// Book the secret authorizes
    pub book_id: String,
    /// Chapters of that book, in request order
    pub chapter_uids: Vec<i64>,
}

/// Outcome of presenting a download secret
///
/// An unknown, expired or foreign secret yields `found == false` with empty
/// fields, so callers branch on the flag rather than on an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretUse {
    pub found: bool,
    pub book_id: String,
    pub chapter_uids: Vec<i64>,
}

impl SecretUse {
    pub fn not_found() -> Self {
        SecretUse::default()
    }

    /// Split into `(found, book_id, chapter_uids)`
    pub fn into_parts(self) -> (bool, String, Vec<i64>) {
        (self.found, self.book_id, self.chapter_uids)
    }
}

impl From<Option<DownloadSecret>> for SecretUse {
    fn from(secret: Option<DownloadSecret>) -> Self {
        match secret {
            Some(secret) => SecretUse {
                found: true,
                book_id: secret.book_id,
                chapter_uids: secret.chapter_uids,
            },
            None => SecretUse::not_found(),
        }
    }
}
