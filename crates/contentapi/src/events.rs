use {serde::Deserialize, tracing::debug};

use crate::Result;

/// Lifecycle of a source message as reported by the live stream.
///
/// A record can carry both `deleted` and `edited`; the authoritative
/// tie-break is deleted > edited > created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUser {
    pub id: i64,
    pub username: String,
    /// Avatar file hash, already reflecting any per-message override.
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub id: i64,
    pub text: String,
    /// Markup language tag (`plaintext` when the message carries none).
    pub markup: String,
}

/// One decoded message event from a live envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub state: MessageState,
    pub message: SourceMessage,
    pub user: SourceUser,
    pub room_id: i64,
}

// ── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct LiveData {
    #[serde(default)]
    events: Vec<EventRecord>,
    objects: LiveObjects,
}

#[derive(Deserialize)]
struct EventRecord {
    #[serde(rename = "refId")]
    ref_id: i64,
}

#[derive(Deserialize)]
struct LiveObjects {
    message_event: MessageEventObjects,
}

#[derive(Deserialize)]
struct MessageEventObjects {
    #[serde(default)]
    message: Vec<MessageRecord>,
    #[serde(default)]
    user: Vec<UserRecord>,
}

#[derive(Deserialize)]
struct MessageRecord {
    id: i64,
    #[serde(default)]
    text: String,
    #[serde(rename = "contentId")]
    content_id: i64,
    #[serde(rename = "createUserId")]
    create_user_id: i64,
    #[serde(default)]
    edited: i64,
    #[serde(default)]
    deleted: i64,
    #[serde(default)]
    values: MessageValues,
}

/// Per-message overrides: `m` markup language, `a` avatar hash. These take
/// precedence over the author's own user record.
#[derive(Deserialize, Default)]
struct MessageValues {
    #[serde(rename = "m")]
    markup: Option<String>,
    #[serde(rename = "a")]
    avatar: Option<String>,
}

#[derive(Deserialize)]
struct UserRecord {
    id: i64,
    username: String,
    #[serde(default)]
    avatar: String,
}

impl MessageRecord {
    fn state(&self) -> MessageState {
        if self.deleted != 0 {
            MessageState::Deleted
        } else if self.edited != 0 {
            MessageState::Updated
        } else {
            MessageState::Created
        }
    }
}

/// Decode one raw websocket frame into message events.
///
/// Non-`live` envelopes yield no events and no error. Event records whose
/// `refId` cannot be resolved against the message table, or whose author is
/// missing from the user table, are skipped.
pub fn parse_message_events(data: &str) -> Result<Vec<MessageEvent>> {
    let envelope: Envelope = serde_json::from_str(data)?;
    if envelope.kind != "live" {
        return Ok(Vec::new());
    }
    let live: LiveData = serde_json::from_value(envelope.data)?;
    let tables = live.objects.message_event;

    let mut events = Vec::with_capacity(live.events.len());
    for record in &live.events {
        let Some(message) = tables.message.iter().find(|m| m.id == record.ref_id) else {
            debug!(ref_id = record.ref_id, "event references unknown message");
            continue;
        };
        let Some(user) = tables.user.iter().find(|u| u.id == message.create_user_id) else {
            debug!(
                message_id = message.id,
                user_id = message.create_user_id,
                "message author missing from user table"
            );
            continue;
        };

        events.push(MessageEvent {
            state: message.state(),
            message: SourceMessage {
                id: message.id,
                text: message.text.clone(),
                markup: message
                    .values
                    .markup
                    .clone()
                    .unwrap_or_else(|| "plaintext".into()),
            },
            user: SourceUser {
                id: user.id,
                username: user.username.clone(),
                avatar: message
                    .values
                    .avatar
                    .clone()
                    .unwrap_or_else(|| user.avatar.clone()),
            },
            room_id: message.content_id,
        });
    }
    Ok(events)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn live_frame(message: serde_json::Value) -> String {
        serde_json::json!({
            "type": "live",
            "data": {
                "events": [{ "refId": message["id"] }],
                "objects": {
                    "message_event": {
                        "message": [message],
                        "user": [{ "id": 7, "username": "ann", "avatar": "uhash" }]
                    }
                }
            }
        })
        .to_string()
    }

    fn message(values: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": 10,
            "text": "hi",
            "contentId": 42,
            "createUserId": 7,
            "edited": 0,
            "deleted": 0,
            "values": values
        })
    }

    #[test]
    fn decodes_created_event() {
        let events = parse_message_events(&live_frame(message(serde_json::json!({})))).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.state, MessageState::Created);
        assert_eq!(event.room_id, 42);
        assert_eq!(event.message.text, "hi");
        assert_eq!(event.message.markup, "plaintext");
        assert_eq!(event.user.username, "ann");
        assert_eq!(event.user.avatar, "uhash");
    }

    #[test]
    fn values_override_markup_and_avatar() {
        let frame = live_frame(message(serde_json::json!({ "m": "12y", "a": "ahash" })));
        let events = parse_message_events(&frame).unwrap();
        assert_eq!(events[0].message.markup, "12y");
        assert_eq!(events[0].user.avatar, "ahash");
    }

    #[test]
    fn deleted_wins_over_edited() {
        let mut msg = message(serde_json::json!({}));
        msg["edited"] = 1.into();
        msg["deleted"] = 1.into();
        let events = parse_message_events(&live_frame(msg)).unwrap();
        assert_eq!(events[0].state, MessageState::Deleted);
    }

    #[test]
    fn edited_yields_updated() {
        let mut msg = message(serde_json::json!({}));
        msg["edited"] = 1.into();
        let events = parse_message_events(&live_frame(msg)).unwrap();
        assert_eq!(events[0].state, MessageState::Updated);
    }

    #[test]
    fn non_live_envelope_is_ignored() {
        let frame = serde_json::json!({ "type": "unexpected", "data": {} }).to_string();
        assert!(parse_message_events(&frame).unwrap().is_empty());
    }

    #[test]
    fn unresolvable_ref_is_skipped() {
        let frame = serde_json::json!({
            "type": "live",
            "data": {
                "events": [{ "refId": 999 }],
                "objects": { "message_event": { "message": [], "user": [] } }
            }
        })
        .to_string();
        assert!(parse_message_events(&frame).unwrap().is_empty());
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(parse_message_events("{not json").is_err());
        assert!(parse_message_events(r#"{"type": "live", "data": {"events": 3}}"#).is_err());
    }
}
