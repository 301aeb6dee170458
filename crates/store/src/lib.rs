//! SQLite-backed association stores.
//!
//! Four independent point-keyed tables carry all the bookkeeping that makes
//! mirroring idempotent: channel bindings, cached avatars, outbound mirrored
//! messages, and inbound message links. Cross-table consistency is the
//! mirror protocols' job, not the storage layer's, so no operation here
//! spans more than one statement.

pub mod avatars;
pub mod bindings;
pub mod inbound_links;
pub mod mirrored;

pub use {
    avatars::{AvatarRecord, AvatarStore},
    bindings::{BindingStore, ChannelBinding},
    inbound_links::{InboundLinkStore, InboundMessageLink},
    mirrored::{MirroredMessage, MirroredMessageStore},
};

use {
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    std::path::Path,
};

/// Open (creating if missing) the bridge database at `path`.
pub async fn open(path: &Path) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new().connect_with(options).await
}

/// Create all bridge tables if they do not exist yet. No schema versioning
/// beyond this.
pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
    BindingStore::init(pool).await?;
    AvatarStore::init(pool).await?;
    MirroredMessageStore::init(pool).await?;
    InboundLinkStore::init(pool).await?;
    Ok(())
}
