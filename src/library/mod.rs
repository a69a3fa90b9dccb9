//! Local preset library: per-entry JSON documents, a derived listing index,
//! and best-effort thumbnails.

mod store;

pub use store::{Library, ThumbnailVariant};
