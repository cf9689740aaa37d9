use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{DownloadSecret, SecretUse};
use crate::config::DownloadConfig;
use crate::credential::Credential;
use crate::error::Result;
use crate::kv::{KvKey, KvStore};

/// Issues and resolves download secrets
pub struct DownloadSecrets {
    store: Arc<dyn KvStore>,
    namespace: String,
    ttl: Duration,
}

impl DownloadSecrets {
    /// Create new secret manager
    pub fn new(store: Arc<dyn KvStore>, config: &DownloadConfig) -> Self {
        DownloadSecrets {
            store,
            namespace: config.storage.namespace.clone(),
            ttl: config.secret.ttl(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn secret_key(&self, credential: &Credential, secret: &str) -> KvKey {
        KvKey::new(self.namespace.as_str())
            .push(credential.token.as_str())
            .push(secret)
    }

    /// Issue a fresh secret for `book_id` and `chapter_uids`
    ///
    /// The secret is returned only once the payload is stored.
    pub async fn issue(
        &self,
        credential: &Credential,
        book_id: &str,
        chapter_uids: &[i64],
    ) -> Result<String> {
        let secret = Uuid::new_v4().to_string();
        let payload = DownloadSecret {
            book_id: book_id.to_string(),
            chapter_uids: chapter_uids.to_vec(),
        };

        self.store
            .set(
                &self.secret_key(credential, &secret),
                serde_json::to_value(&payload)?,
                Some(self.ttl),
            )
            .await?;

        info!(
            "Issued download secret for vid {} (book {}, {} chapter(s), valid {}s)",
            credential.vid,
            book_id,
            chapter_uids.len(),
            self.ttl.as_secs()
        );

        Ok(secret)
    }

    /// Resolve a secret without consuming it
    ///
    /// `Ok(None)` covers never issued, issued to another session, and expired.
    /// Backend failures are returned as errors.
    pub async fn lookup(
        &self,
        credential: &Credential,
        secret: &str,
    ) -> Result<Option<DownloadSecret>> {
        let key = self.secret_key(credential, secret);

        match self.store.get(&key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => {
                debug!("No live download secret for vid {}", credential.vid);
                Ok(None)
            }
        }
    }

    /// Present a secret; reusable until it expires
    ///
    /// Any failure to resolve, including a backend error, reads as not found.
    /// Use [`lookup`](Self::lookup) to tell the two apart.
    pub async fn use_secret(&self, credential: &Credential, secret: &str) -> SecretUse {
        match self.lookup(credential, secret).await {
            Ok(found) => SecretUse::from(found),
            Err(e) => {
                warn!(
                    "Download secret lookup failed for vid {}: {}",
                    credential.vid, e
                );
                SecretUse::not_found()
            }
        }
    }
}
