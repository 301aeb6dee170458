//! SDK-agnostic shapes for Discord-side message events, so the inbound
//! mirror can be driven from gateway handlers and from tests alike.

#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: String,
    pub channel_id: String,
    pub author: ChannelAuthor,
    pub content: String,
    pub attachments: Vec<ChannelAttachment>,
}

#[derive(Debug, Clone)]
pub struct ChannelAuthor {
    pub id: String,
    /// Guild nick, else global display name, else username.
    pub display_name: String,
    /// The avatar hash as reported by Discord; the cache invalidation key.
    pub avatar_ref: String,
    /// Downloadable URL of the current avatar image.
    pub avatar_url: String,
    /// Bot/webhook authors are never mirrored (loop prevention).
    pub bot: bool,
}

#[derive(Debug, Clone)]
pub struct ChannelAttachment {
    pub url: String,
    pub filename: String,
}
