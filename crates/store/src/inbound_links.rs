use sqlx::SqlitePool;

/// Reverse mapping for a message authored on Discord and mirrored into a
/// contentapi room.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct InboundMessageLink {
    /// Discord message id of the original post.
    pub message_id: String,
    pub source_message_id: i64,
    pub room_id: i64,
}

/// Inbound mapping store, keyed by Discord message id.
#[derive(Clone)]
pub struct InboundLinkStore {
    pool: SqlitePool,
}

impl InboundLinkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS inbound_links (
                message_id        TEXT    PRIMARY KEY NOT NULL,
                source_message_id INTEGER NOT NULL,
                room_id           INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn upsert(&self, link: &InboundMessageLink) -> sqlx::Result<()> {
        sqlx::query(
            r#"INSERT INTO inbound_links (message_id, source_message_id, room_id)
               VALUES (?, ?, ?)
               ON CONFLICT(message_id) DO UPDATE SET
                 source_message_id = excluded.source_message_id,
                 room_id = excluded.room_id"#,
        )
        .bind(&link.message_id)
        .bind(link.source_message_id)
        .bind(link.room_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, message_id: &str) -> sqlx::Result<Option<InboundMessageLink>> {
        sqlx::query_as::<_, InboundMessageLink>(
            "SELECT message_id, source_message_id, room_id FROM inbound_links WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, message_id: &str) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM inbound_links WHERE message_id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
