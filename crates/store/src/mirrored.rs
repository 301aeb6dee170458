use sqlx::SqlitePool;

/// One posted copy of a contentapi message on Discord. A single source
/// message may have many copies (room fan-out) or none.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MirroredMessage {
    /// Discord message id of the webhook post.
    pub message_id: String,
    pub webhook_id: String,
    pub channel_id: String,
    pub source_message_id: i64,
}

/// Outbound mapping store, keyed by Discord message id and queried by
/// contentapi message id for edit/delete propagation.
#[derive(Clone)]
pub struct MirroredMessageStore {
    pool: SqlitePool,
}

impl MirroredMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS mirrored_messages (
                message_id        TEXT    PRIMARY KEY NOT NULL,
                webhook_id        TEXT    NOT NULL,
                channel_id        TEXT    NOT NULL,
                source_message_id INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn upsert(&self, message: &MirroredMessage) -> sqlx::Result<()> {
        sqlx::query(
            r#"INSERT INTO mirrored_messages (message_id, webhook_id, channel_id, source_message_id)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(message_id) DO UPDATE SET
                 webhook_id = excluded.webhook_id,
                 channel_id = excluded.channel_id,
                 source_message_id = excluded.source_message_id"#,
        )
        .bind(&message.message_id)
        .bind(&message.webhook_id)
        .bind(&message.channel_id)
        .bind(message.source_message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, message_id: &str) -> sqlx::Result<Option<MirroredMessage>> {
        sqlx::query_as::<_, MirroredMessage>(
            r#"SELECT message_id, webhook_id, channel_id, source_message_id
               FROM mirrored_messages WHERE message_id = ?"#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// All posted copies of a source message, in insertion order.
    pub async fn for_source_message(
        &self,
        source_message_id: i64,
    ) -> sqlx::Result<Vec<MirroredMessage>> {
        sqlx::query_as::<_, MirroredMessage>(
            r#"SELECT message_id, webhook_id, channel_id, source_message_id
               FROM mirrored_messages WHERE source_message_id = ? ORDER BY rowid"#,
        )
        .bind(source_message_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Drop every copy row for a deleted source message, so an unreachable
    /// channel cannot leave an undeletable row behind.
    pub async fn delete_for_source_message(&self, source_message_id: i64) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM mirrored_messages WHERE source_message_id = ?")
            .bind(source_message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
