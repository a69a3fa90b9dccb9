use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Current entry envelope schema version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Kind of library entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Item,
    Zone,
    Layout,
    Theme,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Item => write!(f, "item"),
            EntryKind::Zone => write!(f, "zone"),
            EntryKind::Layout => write!(f, "layout"),
            EntryKind::Theme => write!(f, "theme"),
        }
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item" => Ok(EntryKind::Item),
            "zone" => Ok(EntryKind::Zone),
            "layout" => Ok(EntryKind::Layout),
            "theme" => Ok(EntryKind::Theme),
            _ => Err(format!(
                "Invalid entry kind '{}'. Valid options: item, zone, layout, theme",
                s
            )),
        }
    }
}

/// One shareable library entry.
///
/// The `data` payload is opaque to this crate; its schema belongs to the UI
/// layer that produces and applies it. Stored on disk as `<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default = "default_envelope_version")]
    pub version: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub app_version: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Stamped when the entry arrived via a community download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<DateTime<Utc>>,
}

fn default_envelope_version() -> u32 {
    ENVELOPE_VERSION
}

impl Entry {
    /// Builds a new envelope around an opaque payload.
    ///
    /// Tags are deduplicated, preserving first occurrence order.
    pub fn new(kind: EntryKind, data: serde_json::Value, tags: Vec<String>) -> Self {
        let mut seen = Vec::new();
        for tag in tags {
            if !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        Self {
            version: ENVELOPE_VERSION,
            id: Uuid::new_v4().to_string(),
            kind,
            created_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            data,
            tags: seen,
            imported_at: None,
        }
    }

    /// Denormalized listing row for this entry.
    pub fn index_record(&self) -> IndexRecord {
        IndexRecord {
            id: self.id.clone(),
            kind: self.kind,
            created_at: self.created_at,
            tags: self.tags.clone(),
            data: self.data.clone(),
        }
    }
}

/// One row of the listing index (`index.json`).
///
/// Carries the `data` payload so list views can render previews without
/// opening every entry file. Entry files are authoritative; the index is
/// rebuilt from them whenever the two diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub data: serde_json::Value,
}

/// Entry summary as reported by the community feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<i64>,
}

/// Parameters for a community browse.
#[derive(Debug, Clone, Default)]
pub struct BrowseQuery {
    pub kind: Option<EntryKind>,
    pub variable: Option<String>,
    pub action: Option<String>,
    pub search: Option<String>,
    /// "newest", "popular", or "name". Empty means server default.
    pub sort: Option<String>,
    /// 1-based page number. Zero is treated as page 1.
    pub page: u32,
    /// Restrict results to entries this device published.
    pub mine: bool,
    /// Override the server's default page size.
    pub per_page: Option<u32>,
}

impl BrowseQuery {
    /// True when this query can be served from the delta cache: no filters,
    /// no search, first page, server-default page size, everyone's entries.
    pub fn is_delta(&self) -> bool {
        self.kind.is_none()
            && self.variable.as_deref().unwrap_or("").is_empty()
            && self.action.as_deref().unwrap_or("").is_empty()
            && self.search.as_deref().unwrap_or("").is_empty()
            && self.page <= 1
            && !self.mine
            && self.per_page.is_none()
    }
}
