//! The bidirectional mirroring engine.
//!
//! The [`Ingester`] owns the long-lived contentapi live stream and drives
//! the [`OutboundMirror`] (contentapi → Discord webhooks). The
//! [`InboundMirror`] (Discord → contentapi) is called synchronously from
//! the Discord gateway handlers. Both mirrors record their work in the
//! association stores so create/edit/delete propagation is idempotent and
//! survives restarts; there is no cross-table atomicity, and callers
//! tolerate partially-applied steps as logged, non-fatal outcomes.

pub mod attachments;
pub mod avatar;
pub mod error;
pub mod inbound;
pub mod ingester;
pub mod outbound;
pub mod types;

pub use {
    avatar::AvatarCache,
    error::{Error, Result},
    inbound::{INBOUND_MARKUP_LANG, InboundMirror},
    ingester::{EventSink, Ingester, IngesterStatus},
    outbound::OutboundMirror,
    types::{ChannelAttachment, ChannelAuthor, ChannelMessage},
};
