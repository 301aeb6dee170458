//! contentapi client crate.
//!
//! Two halves: a reqwest-based REST client for the write/edit/delete/upload
//! endpoints, and a strict serde decoder for the live websocket envelope
//! that turns raw frames into typed [`MessageEvent`]s.

pub mod client;
pub mod error;
pub mod events;

pub use {
    client::{ContentApiClient, DEFAULT_AVATAR_SIZE},
    error::{Error, Result},
    events::{MessageEvent, MessageState, SourceMessage, SourceUser, parse_message_events},
};
