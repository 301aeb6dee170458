use sqlx::SqlitePool;

/// One Discord channel bound to one contentapi room. A room may fan out to
/// many channels; a channel mirrors at most one room.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ChannelBinding {
    pub channel_id: String,
    pub room_id: i64,
}

/// Persistent channel ↔ room bindings, keyed by Discord channel id.
#[derive(Clone)]
pub struct BindingStore {
    pool: SqlitePool,
}

impl BindingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS channel_bindings (
                channel_id TEXT    PRIMARY KEY NOT NULL,
                room_id    INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert or replace. Rebinding a channel overwrites its prior room.
    pub async fn upsert(&self, binding: &ChannelBinding) -> sqlx::Result<()> {
        sqlx::query(
            r#"INSERT INTO channel_bindings (channel_id, room_id)
               VALUES (?, ?)
               ON CONFLICT(channel_id) DO UPDATE SET room_id = excluded.room_id"#,
        )
        .bind(&binding.channel_id)
        .bind(binding.room_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `None` means the channel is not bound — a normal branch for callers,
    /// not a failure.
    pub async fn get(&self, channel_id: &str) -> sqlx::Result<Option<ChannelBinding>> {
        sqlx::query_as::<_, ChannelBinding>(
            "SELECT channel_id, room_id FROM channel_bindings WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// All channels bound to a room, in insertion order.
    pub async fn for_room(&self, room_id: i64) -> sqlx::Result<Vec<ChannelBinding>> {
        sqlx::query_as::<_, ChannelBinding>(
            "SELECT channel_id, room_id FROM channel_bindings WHERE room_id = ? ORDER BY rowid",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Deleting a missing key is not an error.
    pub async fn delete(&self, channel_id: &str) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM channel_bindings WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::test_util::memory_pool};

    fn binding(channel: &str, room: i64) -> ChannelBinding {
        ChannelBinding {
            channel_id: channel.into(),
            room_id: room,
        }
    }

    #[tokio::test]
    async fn upsert_and_get() {
        let store = BindingStore::new(memory_pool().await);
        store.upsert(&binding("c1", 42)).await.unwrap();

        let got = store.get("c1").await.unwrap().unwrap();
        assert_eq!(got.room_id, 42);
    }

    #[tokio::test]
    async fn rebind_replaces_room() {
        let store = BindingStore::new(memory_pool().await);
        store.upsert(&binding("c1", 42)).await.unwrap();
        store.upsert(&binding("c1", 99)).await.unwrap();

        let got = store.get("c1").await.unwrap().unwrap();
        assert_eq!(got.room_id, 99);
        assert_eq!(store.for_room(42).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn fan_out_lists_all_channels_for_room() {
        let store = BindingStore::new(memory_pool().await);
        store.upsert(&binding("c1", 42)).await.unwrap();
        store.upsert(&binding("c2", 42)).await.unwrap();
        store.upsert(&binding("c3", 7)).await.unwrap();

        let bound = store.for_room(42).await.unwrap();
        let channels: Vec<_> = bound.iter().map(|b| b.channel_id.as_str()).collect();
        assert_eq!(channels, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = BindingStore::new(memory_pool().await);
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = BindingStore::new(memory_pool().await);
        store.upsert(&binding("c1", 42)).await.unwrap();
        store.delete("c1").await.unwrap();
        store.delete("c1").await.unwrap();
        assert!(store.get("c1").await.unwrap().is_none());
    }
}
