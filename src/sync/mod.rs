//! Community catalog synchronization.
//!
//! One-way incremental sync against the shared catalog: uploads converge
//! local entries onto server-assigned ids (including through content
//! conflicts), the unfiltered feed is mirrored into a persisted delta cache
//! bounded by a high-watermark timestamp, and server-reported tombstones
//! purge deleted entries from the mirror.

pub mod cache;
pub mod client;
pub mod error;

pub use cache::CommunityCache;
pub use client::{BrowseResult, DownloadOutcome, SyncClient, UploadOutcome};
pub use error::SyncError;
