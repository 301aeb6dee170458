//! Discord → contentapi mirroring, driven from gateway message events.

use {
    mirrorbot_contentapi::ContentApiClient,
    mirrorbot_markup::MarkupClient,
    mirrorbot_store::{AvatarStore, BindingStore, InboundLinkStore, InboundMessageLink},
    sqlx::SqlitePool,
    tracing::debug,
};

use crate::{
    Result,
    attachments::{attachment_line, fetch_bytes, rehost_attachment},
    avatar::{AVATAR_BUCKET, AvatarCache},
    types::ChannelMessage,
};

/// Markup language tag stamped on every message the bridge writes.
pub const INBOUND_MARKUP_LANG: &str = "12y";

pub struct InboundMirror {
    bindings: BindingStore,
    links: InboundLinkStore,
    avatars: AvatarCache,
    contentapi: ContentApiClient,
    markup: MarkupClient,
    http: reqwest::Client,
}

impl InboundMirror {
    pub fn new(pool: SqlitePool, contentapi: ContentApiClient, markup: MarkupClient) -> Self {
        Self {
            bindings: BindingStore::new(pool.clone()),
            links: InboundLinkStore::new(pool.clone()),
            avatars: AvatarCache::new(AvatarStore::new(pool)),
            contentapi,
            markup,
            http: reqwest::Client::new(),
        }
    }

    /// Mirror a freshly posted channel message into its bound room.
    pub async fn handle_create(&self, message: &ChannelMessage) -> Result<()> {
        if message.author.bot {
            // Webhook posts (our own mirrors included) and other bots never
            // cross the bridge.
            return Ok(());
        }
        let Some(binding) = self.bindings.get(&message.channel_id).await? else {
            return Ok(());
        };

        let avatar = self.resolve_channel_avatar(message).await?;
        let text = self.render_text(message).await?;

        let source_message_id = self
            .contentapi
            .write_message(
                binding.room_id,
                &text,
                &message.author.display_name,
                &avatar,
                INBOUND_MARKUP_LANG,
            )
            .await?;

        self.links
            .upsert(&InboundMessageLink {
                message_id: message.id.clone(),
                source_message_id,
                room_id: binding.room_id,
            })
            .await?;
        Ok(())
    }

    /// Propagate an edit by rewriting the linked source message in place.
    pub async fn handle_edit(&self, message: &ChannelMessage) -> Result<()> {
        if message.author.bot {
            return Ok(());
        }
        if self.bindings.get(&message.channel_id).await?.is_none() {
            return Ok(());
        }
        let Some(link) = self.links.get(&message.id).await? else {
            debug!(message_id = %message.id, "edit for unlinked channel message");
            return Ok(());
        };

        let avatar = self.resolve_channel_avatar(message).await?;
        let text = self.render_text(message).await?;
        self.contentapi
            .edit_message(
                link.source_message_id,
                link.room_id,
                &text,
                &message.author.display_name,
                &avatar,
                INBOUND_MARKUP_LANG,
            )
            .await?;
        Ok(())
    }

    /// Delete the linked source copy of a deleted channel message. Deletes
    /// of unlinked messages are normal and ignored.
    pub async fn handle_delete(&self, message_id: &str) -> Result<()> {
        let Some(link) = self.links.get(message_id).await? else {
            return Ok(());
        };
        self.contentapi.delete_message(link.source_message_id).await?;
        // The link row stays behind; the source side already shows the
        // message as deleted and re-deletes are idempotent upstream.
        Ok(())
    }

    /// Translated message text with one reference line appended per
    /// attachment.
    async fn render_text(&self, message: &ChannelMessage) -> Result<String> {
        let mut text = self.markup.to_contentapi(&message.content).await?;
        for attachment in &message.attachments {
            let url = rehost_attachment(&self.http, &self.contentapi, &attachment.url).await?;
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&attachment_line(&url, &attachment.filename));
        }
        Ok(text)
    }

    async fn resolve_channel_avatar(&self, message: &ChannelMessage) -> Result<String> {
        let key = format!("discord:{}", message.author.id);
        self.avatars
            .resolve(&key, &message.author.avatar_ref, || async {
                let bytes = fetch_bytes(&self.http, &message.author.avatar_url).await?;
                Ok(self
                    .contentapi
                    .upload_file(AVATAR_BUCKET, bytes, "avatar.webp")
                    .await?)
            })
            .await
    }
}
