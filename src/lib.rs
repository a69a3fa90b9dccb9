//! Local-first preset library with community sharing.
//!
//! Entries (items, zones, layouts, themes) live as individual JSON documents
//! in a local library with a rebuildable listing index. An optional sync
//! client publishes entries to a shared community catalog and mirrors the
//! catalog's feed into a persisted delta cache. A loopback HTTP bridge
//! exposes both to the presentation layer.

pub mod commands;
pub mod config;
pub mod library;
pub mod models;
pub mod server;
pub mod sync;

pub use config::{Config, ConfigError};
pub use library::{Library, ThumbnailVariant};
pub use models::{BrowseQuery, Entry, EntryKind, IndexRecord, RemoteEntry};
pub use sync::{CommunityCache, SyncClient, SyncError};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
