//! Discord REST surface used by the mirror.
//!
//! Webhook posting goes through a plain reqwest client rather than an SDK
//! session so the mirror can post under arbitrary display names and avatars,
//! and so tests can point it at a local server.

pub mod error;
pub mod mentions;
pub mod rest;
pub mod webhooks;

pub use {
    error::{Error, Result},
    mentions::defuse_mass_mentions,
    rest::{DiscordClient, Webhook, WebhookPost},
    webhooks::{WEBHOOK_NAME, WebhookManager},
};
