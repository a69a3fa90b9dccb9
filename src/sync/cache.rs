//! Persisted mirror of the unfiltered community feed.
//!
//! The cache document holds the feed entries newest-first plus a watermark:
//! the newest `createdAt` ever observed. Delta fetches ask the server only
//! for entries at or after the watermark; the server re-serves entries
//! created at exactly the watermark instant, and the merge deduplicates them
//! here instead of skipping them, so same-instant entries are never lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::models::RemoteEntry;

/// Cached view of the unfiltered community feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityCache {
    /// Newest `createdAt` ever observed from the feed; never decreases.
    pub newest_created_at: Option<DateTime<Utc>>,
    /// Feed entries, newest-first, deduplicated by id.
    pub entries: Vec<RemoteEntry>,
}

impl CommunityCache {
    /// Loads the cache document, or an empty cache when the file is missing
    /// or unreadable (the mirror is rebuilt by future delta fetches).
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(cache) => cache,
                Err(e) => {
                    tracing::warn!("Invalid community cache, starting fresh: {}", e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persists the cache as one document (temp file + rename).
    pub fn persist(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, path)
    }

    /// Merges a freshly fetched batch into the cache.
    ///
    /// The batch is sorted newest-first client-side rather than trusting the
    /// server's ordering. Entries whose id is already cached are dropped;
    /// the rest are placed ahead of the existing entries in batch order, and
    /// the watermark advances to the newest accepted `createdAt`.
    pub fn merge(&mut self, mut batch: Vec<RemoteEntry>) {
        batch.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut fresh: Vec<RemoteEntry> = Vec::new();
        for entry in batch {
            if self.entries.iter().any(|e| e.id == entry.id) {
                continue;
            }
            if fresh.iter().any(|e: &RemoteEntry| e.id == entry.id) {
                continue;
            }
            self.newest_created_at = Some(match self.newest_created_at {
                Some(w) => w.max(entry.created_at),
                None => entry.created_at,
            });
            fresh.push(entry);
        }

        if !fresh.is_empty() {
            fresh.extend(self.entries.drain(..));
            self.entries = fresh;
        }
    }

    /// Applies server-reported deletion tombstones. The watermark is left
    /// untouched: deletions carry no ordering information.
    pub fn remove(&mut self, deleted_ids: &[String]) {
        if deleted_ids.is_empty() {
            return;
        }
        self.entries.retain(|e| !deleted_ids.contains(&e.id));
    }
}
