//! Discord gateway event handler for serenity.
//!
//! Routes channel admin commands to the binding store and everything else
//! to the inbound mirror.

use std::sync::Arc;

use {
    mirrorbot_bridge::{InboundMirror, types::{ChannelAttachment, ChannelAuthor, ChannelMessage}},
    mirrorbot_store::{BindingStore, ChannelBinding},
    serenity::{
        all::{
            ChannelId, Context, EventHandler, GatewayIntents, GuildId, Message, MessageId,
            MessageUpdateEvent, Ready,
        },
        async_trait,
    },
    tracing::{info, warn},
};

/// Channel admin commands, typed as ordinary messages by channel members.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Bind(i64),
    Unbind,
}

fn parse_command(content: &str) -> Option<Command> {
    let content = content.trim();
    if let Some(rest) = content.strip_prefix("[bind]") {
        return rest.trim().parse().ok().map(Command::Bind);
    }
    if content == "[unbind]" {
        return Some(Command::Unbind);
    }
    None
}

/// Handler for Discord gateway events.
pub struct BridgeHandler {
    bindings: BindingStore,
    inbound: Arc<InboundMirror>,
}

impl BridgeHandler {
    pub fn new(bindings: BindingStore, inbound: Arc<InboundMirror>) -> Self {
        Self { bindings, inbound }
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    async fn run_command(&self, ctx: &Context, msg: &Message, command: Command) {
        let channel_id = msg.channel_id.to_string();
        let reply = match command {
            Command::Bind(room_id) => {
                match self
                    .bindings
                    .upsert(&ChannelBinding {
                        channel_id,
                        room_id,
                    })
                    .await
                {
                    Ok(()) => format!("Bound to room {room_id}"),
                    Err(err) => {
                        warn!(error = %err, "bind command failed");
                        return;
                    }
                }
            }
            Command::Unbind => match self.bindings.delete(&channel_id).await {
                Ok(()) => "Channel unbound from any references.".to_string(),
                Err(err) => {
                    warn!(error = %err, "unbind command failed");
                    return;
                }
            },
        };
        if let Err(err) = msg.reply(&ctx.http, reply).await {
            warn!(error = %err, "could not reply to command");
        }
    }
}

/// Display name preference: guild nick, then global display name, then
/// username.
fn display_name(msg: &Message) -> String {
    msg.member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .or_else(|| msg.author.global_name.clone())
        .unwrap_or_else(|| msg.author.name.clone())
}

fn channel_message(msg: &Message) -> ChannelMessage {
    ChannelMessage {
        id: msg.id.to_string(),
        channel_id: msg.channel_id.to_string(),
        author: ChannelAuthor {
            id: msg.author.id.to_string(),
            display_name: display_name(msg),
            avatar_ref: msg
                .author
                .avatar
                .map(|hash| hash.to_string())
                .unwrap_or_default(),
            avatar_url: msg
                .author
                .avatar_url()
                .unwrap_or_else(|| msg.author.default_avatar_url()),
            bot: msg.author.bot,
        },
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|attachment| ChannelAttachment {
                url: attachment.url.clone(),
                filename: attachment.filename.clone(),
            })
            .collect(),
    }
}

#[async_trait]
impl EventHandler for BridgeHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord gateway ready"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if !msg.author.bot
            && let Some(command) = parse_command(&msg.content)
        {
            self.run_command(&ctx, &msg, command).await;
            return;
        }

        if let Err(err) = self.inbound.handle_create(&channel_message(&msg)).await {
            warn!(message_id = %msg.id, error = %err, "failed to mirror channel message");
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        // Partial updates without the full new message (embed unfurls and
        // the like) carry nothing worth mirroring.
        let Some(msg) = new else {
            return;
        };
        if parse_command(&msg.content).is_some() {
            return;
        }
        if let Err(err) = self.inbound.handle_edit(&channel_message(&msg)).await {
            warn!(message_id = %event.id, error = %err, "failed to mirror message edit");
        }
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        _channel_id: ChannelId,
        message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        if let Err(err) = self.inbound.handle_delete(&message_id.to_string()).await {
            warn!(%message_id, error = %err, "failed to mirror message deletion");
        }
    }
}
