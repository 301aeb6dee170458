use mirrorbot_store::{AvatarRecord, AvatarStore};

use crate::Result;

/// Bucket for re-hosted avatar images on contentapi.
pub(crate) const AVATAR_BUCKET: &str = "bridge-avatars";

/// Content-addressed cache of re-hosted user avatars.
///
/// An entry stays valid while the origin reference (the avatar hash/url on
/// the owning platform) is unchanged; a changed avatar is ordinary
/// behavior, not an error. The check-then-fetch sequence is unlocked, so
/// two concurrent resolves for one user may both upload; the store's
/// replace-on-upsert converges to the last writer.
pub struct AvatarCache {
    store: AvatarStore,
}

impl AvatarCache {
    pub fn new(store: AvatarStore) -> Self {
        Self { store }
    }

    /// Return the re-hosted avatar hash for `user_key`, fetching and
    /// re-uploading via `fetch` on a cache miss or a stale origin.
    pub async fn resolve<F, Fut>(&self, user_key: &str, origin_ref: &str, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(record) = self.store.get(user_key).await?
            && record.origin_ref == origin_ref
        {
            return Ok(record.hash);
        }

        let hash = fetch().await?;
        self.store
            .upsert(&AvatarRecord {
                user_key: user_key.to_string(),
                origin_ref: origin_ref.to_string(),
                hash: hash.clone(),
            })
            .await?;
        Ok(hash)
    }
}
