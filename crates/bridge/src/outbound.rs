//! contentapi → Discord mirroring: fan a source message out to every bound
//! channel through the per-channel bridge webhook.

use {
    mirrorbot_contentapi::{ContentApiClient, DEFAULT_AVATAR_SIZE, MessageEvent, MessageState},
    mirrorbot_discord::{DiscordClient, WebhookManager, WebhookPost, defuse_mass_mentions},
    mirrorbot_markup::MarkupClient,
    mirrorbot_store::{BindingStore, MirroredMessage, MirroredMessageStore},
    sqlx::SqlitePool,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    attachments::fetch_bytes,
    avatar::{AVATAR_BUCKET, AvatarCache},
};

pub struct OutboundMirror {
    bindings: BindingStore,
    mirrored: MirroredMessageStore,
    avatars: AvatarCache,
    contentapi: ContentApiClient,
    discord: DiscordClient,
    webhooks: WebhookManager,
    markup: MarkupClient,
    http: reqwest::Client,
}

impl OutboundMirror {
    pub fn new(
        pool: SqlitePool,
        contentapi: ContentApiClient,
        discord: DiscordClient,
        markup: MarkupClient,
    ) -> Self {
        Self {
            bindings: BindingStore::new(pool.clone()),
            mirrored: MirroredMessageStore::new(pool.clone()),
            avatars: AvatarCache::new(mirrorbot_store::AvatarStore::new(pool)),
            contentapi,
            webhooks: WebhookManager::new(discord.clone()),
            discord,
            markup,
            http: reqwest::Client::new(),
        }
    }

    /// Apply one decoded live event to every bound channel.
    pub async fn handle_event(&self, event: &MessageEvent) -> Result<()> {
        match event.state {
            MessageState::Created => self.mirror_create(event).await,
            MessageState::Updated => self.mirror_update(event).await,
            MessageState::Deleted => self.mirror_delete(event).await,
        }
    }

    async fn mirror_create(&self, event: &MessageEvent) -> Result<()> {
        let bound = self.bindings.for_room(event.room_id).await?;
        if bound.is_empty() {
            return Ok(());
        }

        // Translation and avatar resolution happen once per event; their
        // failure aborts the whole event rather than one channel.
        let content = self.render_content(event).await?;
        let avatar_url = self.resolve_source_avatar(event).await?;

        for binding in bound {
            // One unreachable channel must not starve the rest of the
            // fan-out; the failed copy is simply never recorded.
            if let Err(err) = self
                .post_to_channel(event, &binding.channel_id, &content, &avatar_url)
                .await
            {
                warn!(
                    channel_id = %binding.channel_id,
                    source_message_id = event.message.id,
                    error = %err,
                    "failed to mirror message to channel"
                );
            }
        }
        Ok(())
    }

    async fn post_to_channel(
        &self,
        event: &MessageEvent,
        channel_id: &str,
        content: &str,
        avatar_url: &str,
    ) -> Result<()> {
        let webhook = self.webhooks.find_or_create(channel_id).await?;
        let token = webhook
            .token
            .as_deref()
            .ok_or_else(|| Error::message("webhook has no execute token"))?;

        let message_id = self
            .discord
            .execute_webhook(
                &webhook.id,
                token,
                &WebhookPost {
                    content,
                    username: &event.user.username,
                    avatar_url,
                },
            )
            .await?;

        self.mirrored
            .upsert(&MirroredMessage {
                message_id,
                webhook_id: webhook.id,
                channel_id: channel_id.to_string(),
                source_message_id: event.message.id,
            })
            .await?;
        Ok(())
    }

    async fn mirror_update(&self, event: &MessageEvent) -> Result<()> {
        let copies = self.mirrored.for_source_message(event.message.id).await?;
        if copies.is_empty() {
            // Edits to messages that predate the bridge (or whose create was
            // never mirrored) are silently dropped.
            debug!(source_message_id = event.message.id, "edit for unmirrored message");
            return Ok(());
        }

        let content = self.render_content(event).await?;
        for copy in copies {
            if let Err(err) = self.edit_copy(&copy, &content).await {
                warn!(
                    message_id = %copy.message_id,
                    channel_id = %copy.channel_id,
                    error = %err,
                    "failed to propagate edit to channel"
                );
            }
        }
        Ok(())
    }

    async fn edit_copy(&self, copy: &MirroredMessage, content: &str) -> Result<()> {
        // The execute token is not stored; re-fetch the webhook for it.
        let webhook = self.discord.webhook(&copy.webhook_id).await?;
        let token = webhook
            .token
            .as_deref()
            .ok_or_else(|| Error::message("webhook has no execute token"))?;
        self.discord
            .edit_webhook_message(&copy.webhook_id, token, &copy.message_id, content)
            .await?;
        Ok(())
    }

    async fn mirror_delete(&self, event: &MessageEvent) -> Result<()> {
        let copies = self.mirrored.for_source_message(event.message.id).await?;
        for copy in &copies {
            if let Err(err) = self.delete_copy(copy).await {
                warn!(
                    message_id = %copy.message_id,
                    channel_id = %copy.channel_id,
                    error = %err,
                    "failed to delete mirrored copy"
                );
            }
        }

        // Rows go away regardless of per-copy failures; a permanently
        // unreachable webhook must not leave an undeletable row behind.
        self.mirrored
            .delete_for_source_message(event.message.id)
            .await?;
        Ok(())
    }

    async fn delete_copy(&self, copy: &MirroredMessage) -> Result<()> {
        let webhook = self.discord.webhook(&copy.webhook_id).await?;
        let token = webhook
            .token
            .as_deref()
            .ok_or_else(|| Error::message("webhook has no execute token"))?;
        self.discord
            .delete_webhook_message(&copy.webhook_id, token, &copy.message_id)
            .await?;
        Ok(())
    }

    async fn render_content(&self, event: &MessageEvent) -> Result<String> {
        let translated = self
            .markup
            .to_discord(&event.message.text, &event.message.markup)
            .await?;
        Ok(defuse_mass_mentions(&translated))
    }

    /// Re-hosted avatar URL for the source author, resolved through the
    /// cache keyed on the author's contentapi id.
    async fn resolve_source_avatar(&self, event: &MessageEvent) -> Result<String> {
        let key = format!("contentapi:{}", event.user.id);
        let origin = self.contentapi.avatar_url(&event.user.avatar, DEFAULT_AVATAR_SIZE);
        let hash = self
            .avatars
            .resolve(&key, &event.user.avatar, || async {
                let bytes = fetch_bytes(&self.http, &origin).await?;
                Ok(self
                    .contentapi
                    .upload_file(AVATAR_BUCKET, bytes, "avatar.webp")
                    .await?)
            })
            .await?;
        Ok(self.contentapi.avatar_url(&hash, DEFAULT_AVATAR_SIZE))
    }
}

#[async_trait::async_trait]
impl crate::EventSink for OutboundMirror {
    async fn deliver(&self, event: MessageEvent) -> anyhow::Result<()> {
        self.handle_event(&event).await?;
        Ok(())
    }
}
