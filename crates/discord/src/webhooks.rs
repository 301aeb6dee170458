use {tokio::sync::OnceCell, tracing::debug};

use crate::{
    Result,
    rest::{DiscordClient, Webhook},
};

/// Fixed display name for webhooks created by the bridge.
pub const WEBHOOK_NAME: &str = "mirrorbot bridge";

/// Finds or creates the single bridge webhook per channel.
///
/// Webhooks are re-resolved on every post rather than cached, so a webhook
/// deleted externally heals itself on the next post. Only the bot's own
/// user id is resolved once.
pub struct WebhookManager {
    client: DiscordClient,
    own_user_id: OnceCell<String>,
}

impl WebhookManager {
    pub fn new(client: DiscordClient) -> Self {
        Self {
            client,
            own_user_id: OnceCell::new(),
        }
    }

    async fn own_user_id(&self) -> Result<&str> {
        let id = self
            .own_user_id
            .get_or_try_init(|| async { Ok::<_, crate::Error>(self.client.current_user().await?.id) })
            .await?;
        Ok(id.as_str())
    }

    /// Return the channel's bridge webhook, creating it if absent.
    pub async fn find_or_create(&self, channel_id: &str) -> Result<Webhook> {
        let own_id = self.own_user_id().await?;
        let webhooks = self.client.channel_webhooks(channel_id).await?;
        if let Some(webhook) = webhooks
            .into_iter()
            .find(|w| w.user.as_ref().is_some_and(|u| u.id == own_id))
        {
            return Ok(webhook);
        }

        debug!(channel_id, "no bridge webhook on channel, creating one");
        self.client.create_webhook(channel_id, WEBHOOK_NAME).await
    }
}
