use sqlx::SqlitePool;

/// A cached, re-uploaded copy of a user's avatar. Valid only while
/// `origin_ref` still matches the live value on the owning platform.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AvatarRecord {
    /// Namespaced user key (`contentapi:{id}` or `discord:{id}`).
    pub user_key: String,
    /// The avatar reference observed on the owning platform (hash or url).
    pub origin_ref: String,
    /// contentapi file hash of the re-hosted copy.
    pub hash: String,
}

/// Persistent avatar cache entries, keyed by user.
#[derive(Clone)]
pub struct AvatarStore {
    pool: SqlitePool,
}

impl AvatarStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS avatars (
                user_key   TEXT PRIMARY KEY NOT NULL,
                origin_ref TEXT NOT NULL,
                hash       TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, user_key: &str) -> sqlx::Result<Option<AvatarRecord>> {
        sqlx::query_as::<_, AvatarRecord>(
            "SELECT user_key, origin_ref, hash FROM avatars WHERE user_key = ?",
        )
        .bind(user_key)
        .fetch_optional(&self.pool)
        .await
    }

    /// Replaces all three fields atomically on conflict.
    pub async fn upsert(&self, record: &AvatarRecord) -> sqlx::Result<()> {
        sqlx::query(
            r#"INSERT INTO avatars (user_key, origin_ref, hash)
               VALUES (?, ?, ?)
               ON CONFLICT(user_key) DO UPDATE SET
                 origin_ref = excluded.origin_ref,
                 hash = excluded.hash"#,
        )
        .bind(&record.user_key)
        .bind(&record.origin_ref)
        .bind(&record.hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, user_key: &str) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM avatars WHERE user_key = ?")
            .bind(user_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::test_util::memory_pool};

    #[tokio::test]
    async fn upsert_and_get() {
        let store = AvatarStore::new(memory_pool().await);
        let record = AvatarRecord {
            user_key: "discord:1".into(),
            origin_ref: "abc".into(),
            hash: "h1".into(),
        };
        store.upsert(&record).await.unwrap();

        assert_eq!(store.get("discord:1").await.unwrap().unwrap(), record);
        assert!(store.get("discord:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_whole_record() {
        let store = AvatarStore::new(memory_pool().await);
        store
            .upsert(&AvatarRecord {
                user_key: "discord:1".into(),
                origin_ref: "old".into(),
                hash: "h1".into(),
            })
            .await
            .unwrap();
        store
            .upsert(&AvatarRecord {
                user_key: "discord:1".into(),
                origin_ref: "new".into(),
                hash: "h2".into(),
            })
            .await
            .unwrap();

        let got = store.get("discord:1").await.unwrap().unwrap();
        assert_eq!(got.origin_ref, "new");
        assert_eq!(got.hash, "h2");
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = AvatarStore::new(memory_pool().await);
        store
            .upsert(&AvatarRecord {
                user_key: "contentapi:5".into(),
                origin_ref: "r".into(),
                hash: "h".into(),
            })
            .await
            .unwrap();
        store.delete("contentapi:5").await.unwrap();
        assert!(store.get("contentapi:5").await.unwrap().is_none());
    }
}
