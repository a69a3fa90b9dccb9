//! Durable entry storage.
//!
//! Each entry lives in its own `<id>.json` document under the library
//! directory. A single `index.json` caches `{id, type, createdAt, tags, data}`
//! rows for fast enumeration. The documents are the source of truth: whenever
//! the index is missing, malformed, or structurally stale it is rebuilt by
//! scanning the documents, so any partial failure (a crash mid-rename, a torn
//! index write) heals itself on the next startup.
//!
//! All methods report failure through sentinel returns (`None`/`false`) and a
//! `tracing::warn`; callers own user-facing messaging.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{Entry, EntryKind, IndexRecord};

const INDEX_FILE: &str = "index.json";

/// Thumbnail variants stored alongside an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailVariant {
    Full,
    Compact,
}

impl ThumbnailVariant {
    fn filename(&self, entry_id: &str) -> String {
        match self {
            ThumbnailVariant::Full => format!("{}.png", entry_id),
            ThumbnailVariant::Compact => format!("{}_compact.png", entry_id),
        }
    }
}

/// Local entry store with a derived listing index.
#[derive(Debug)]
pub struct Library {
    dir: PathBuf,
    thumb_dir: PathBuf,
    index: Vec<IndexRecord>,
}

impl Library {
    /// Opens (or creates) a library rooted at `dir`.
    ///
    /// Loads the index, rebuilding it from the entry documents when it is
    /// missing, unparsable, or predates the denormalized `data` column.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let thumb_dir = dir.join("thumbnails");
        if let Err(e) = fs::create_dir_all(&thumb_dir) {
            tracing::warn!("Failed to create library directories: {}", e);
        }

        let mut library = Self {
            dir,
            thumb_dir,
            index: Vec::new(),
        };
        library.load_index();
        library
    }

    /// Library root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All index records, newest save last (document order after a rebuild).
    pub fn entries(&self) -> &[IndexRecord] {
        &self.index
    }

    /// Index records of one kind.
    pub fn entries_by_kind(&self, kind: EntryKind) -> Vec<&IndexRecord> {
        self.index.iter().filter(|r| r.kind == kind).collect()
    }

    /// Metadata for one entry, served from the index without file I/O.
    pub fn get(&self, entry_id: &str) -> Option<&IndexRecord> {
        self.index.iter().find(|r| r.id == entry_id)
    }

    /// Reads the full entry document.
    pub fn read(&self, entry_id: &str) -> Option<Entry> {
        let bytes = self.export(entry_id)?;
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Invalid entry document {}: {}", entry_id, e);
                None
            }
        }
    }

    /// Raw document bytes, exactly as stored (used for upload).
    pub fn export(&self, entry_id: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(entry_id);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!("Entry not readable {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Writes an entry document, creating or overwriting, and updates the
    /// index. Returns the entry id, or `None` on a write failure (the index
    /// is left untouched on failure).
    pub fn save(&mut self, entry: &Entry) -> Option<String> {
        if entry.id.is_empty() {
            tracing::warn!("Refusing to save entry without an id");
            return None;
        }

        let bytes = match serde_json::to_vec(entry) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Failed to serialize entry {}: {}", entry.id, e);
                return None;
            }
        };

        let path = self.entry_path(&entry.id);
        if let Err(e) = fs::write(&path, bytes) {
            tracing::warn!("Failed to write {}: {}", path.display(), e);
            return None;
        }

        let record = entry.index_record();
        match self.index.iter_mut().find(|r| r.id == entry.id) {
            Some(existing) => *existing = record,
            None => self.index.push(record),
        }
        self.save_index();

        tracing::debug!("Saved {} entry {}", entry.kind, entry.id);
        Some(entry.id.clone())
    }

    /// Imports an entry from raw JSON (a community download or a share file).
    ///
    /// Requires `type` and `data` fields. A server-assigned id is kept;
    /// a missing or empty id gets a fresh UUID. Stamps `importedAt`.
    pub fn import(&mut self, json: &[u8]) -> Option<String> {
        let mut entry: Entry = match serde_json::from_slice(json) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Invalid JSON for import: {}", e);
                return None;
            }
        };
        if entry.data.is_null() {
            tracing::warn!("Import rejected: missing data payload");
            return None;
        }
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        entry.imported_at = Some(Utc::now());
        self.save(&entry)
    }

    /// Deletes an entry document, its thumbnails (best-effort), and its index
    /// record.
    pub fn delete(&mut self, entry_id: &str) -> bool {
        let path = self.entry_path(entry_id);
        if !path.exists() {
            tracing::warn!("Entry file not found: {}", path.display());
            return false;
        }
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!("Failed to delete {}: {}", path.display(), e);
            return false;
        }

        for variant in [ThumbnailVariant::Full, ThumbnailVariant::Compact] {
            let _ = fs::remove_file(self.thumbnail_path(entry_id, variant));
        }

        self.index.retain(|r| r.id != entry_id);
        self.save_index();
        tracing::debug!("Deleted entry {}", entry_id);
        true
    }

    /// Reassigns an entry's identity without changing its payload.
    ///
    /// Sequence: write the document under `new_id` (with the id field
    /// updated), remove the old document, move thumbnails (best-effort),
    /// update the index record. The document write followed by the index
    /// update is the durability boundary; a crash between steps leaves a
    /// state the next `rebuild_index` repairs.
    pub fn rename(&mut self, old_id: &str, new_id: &str) -> bool {
        if new_id.is_empty() {
            tracing::warn!("Refusing to rename {} to an empty id", old_id);
            return false;
        }
        if old_id == new_id {
            return true;
        }

        let mut entry = match self.read(old_id) {
            Some(e) => e,
            None => {
                tracing::warn!("Cannot rename missing entry {}", old_id);
                return false;
            }
        };
        entry.id = new_id.to_string();

        let bytes = match serde_json::to_vec(&entry) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Failed to serialize renamed entry: {}", e);
                return false;
            }
        };
        let new_path = self.entry_path(new_id);
        if let Err(e) = fs::write(&new_path, bytes) {
            tracing::warn!("Failed to write {}: {}", new_path.display(), e);
            return false;
        }

        if let Err(e) = fs::remove_file(self.entry_path(old_id)) {
            tracing::warn!("Failed to remove old entry {}: {}", old_id, e);
        }

        for variant in [ThumbnailVariant::Full, ThumbnailVariant::Compact] {
            let from = self.thumbnail_path(old_id, variant);
            if from.exists() {
                let _ = fs::rename(&from, self.thumbnail_path(new_id, variant));
            }
        }

        if let Some(record) = self.index.iter_mut().find(|r| r.id == old_id) {
            record.id = new_id.to_string();
        } else {
            self.index.push(entry.index_record());
        }
        self.save_index();

        tracing::debug!("Renamed entry {} -> {}", old_id, new_id);
        true
    }

    /// Rebuilds the index by scanning the entry documents.
    ///
    /// Unparsable documents are skipped; when two documents claim the same id
    /// the later one (in directory order) is dropped.
    pub fn rebuild_index(&mut self) {
        self.index.clear();

        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!("Cannot scan library directory: {}", e);
                return;
            }
        };

        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(INDEX_FILE) {
                continue;
            }

            let entry: Entry = match fs::read(&path).ok().and_then(|b| {
                serde_json::from_slice(&b).ok()
            }) {
                Some(e) => e,
                None => {
                    tracing::warn!("Skipping unparsable document {}", path.display());
                    continue;
                }
            };

            if self.index.iter().any(|r| r.id == entry.id) {
                tracing::warn!("Duplicate entry id {} at {}", entry.id, path.display());
                continue;
            }
            self.index.push(entry.index_record());
        }

        self.save_index();
        tracing::info!("Rebuilt library index with {} entries", self.index.len());
    }

    // --- Thumbnails ---

    pub fn thumbnail_path(&self, entry_id: &str, variant: ThumbnailVariant) -> PathBuf {
        self.thumb_dir.join(variant.filename(entry_id))
    }

    pub fn has_thumbnail(&self, entry_id: &str, variant: ThumbnailVariant) -> bool {
        self.thumbnail_path(entry_id, variant).exists()
    }

    pub fn save_thumbnail(&self, entry_id: &str, variant: ThumbnailVariant, png: &[u8]) -> bool {
        let path = self.thumbnail_path(entry_id, variant);
        match fs::write(&path, png) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save thumbnail {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn read_thumbnail(&self, entry_id: &str, variant: ThumbnailVariant) -> Option<Vec<u8>> {
        fs::read(self.thumbnail_path(entry_id, variant)).ok()
    }

    // --- Index persistence ---

    fn entry_path(&self, entry_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", entry_id))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn load_index(&mut self) {
        let bytes = match fs::read(self.index_path()) {
            Ok(b) => b,
            Err(_) => {
                // No index yet; derive it from whatever documents exist.
                self.rebuild_index();
                return;
            }
        };

        let raw: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Invalid index, rebuilding: {}", e);
                self.rebuild_index();
                return;
            }
        };

        // An index written before the data column was denormalized is
        // structurally stale and must be regenerated from the documents.
        let stale = raw
            .iter()
            .any(|v| v.as_object().map(|o| !o.contains_key("data")).unwrap_or(true));
        if stale && !raw.is_empty() {
            tracing::info!("Index missing data fields, rebuilding");
            self.rebuild_index();
            return;
        }

        let mut records = Vec::with_capacity(raw.len());
        let mut duplicates = 0usize;
        for value in raw {
            let record: IndexRecord = match serde_json::from_value(value) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Invalid index record, rebuilding: {}", e);
                    self.rebuild_index();
                    return;
                }
            };
            if records.iter().any(|r: &IndexRecord| r.id == record.id) {
                duplicates += 1;
                continue;
            }
            records.push(record);
        }
        self.index = records;

        if duplicates > 0 {
            tracing::debug!("Removed {} duplicate index records", duplicates);
            self.save_index();
        }
        tracing::debug!("Loaded index with {} entries", self.index.len());
    }

    fn save_index(&self) {
        let bytes = match serde_json::to_vec(&self.index) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Failed to serialize index: {}", e);
                return;
            }
        };

        // Temp file + rename so a crash never leaves a torn index.
        let path = self.index_path();
        let temp = path.with_extension("json.tmp");
        if let Err(e) = fs::write(&temp, bytes) {
            tracing::warn!("Failed to write index: {}", e);
            return;
        }
        if let Err(e) = fs::rename(&temp, &path) {
            tracing::warn!("Failed to replace index: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_library() -> (Library, TempDir) {
        let temp = TempDir::new().unwrap();
        let library = Library::open(temp.path());
        (library, temp)
    }

    fn sample_entry(kind: EntryKind) -> Entry {
        Entry::new(kind, json!({"content": "%TEMP%", "color": "#fff"}), vec![])
    }

    #[test]
    fn test_save_read_roundtrip() {
        let (mut library, _temp) = test_library();
        let entry = sample_entry(EntryKind::Item);

        let id = library.save(&entry).unwrap();
        assert_eq!(id, entry.id);

        let loaded = library.read(&id).unwrap();
        assert_eq!(loaded.id, entry.id);
        assert_eq!(loaded.data, entry.data);
        assert_eq!(loaded.kind, EntryKind::Item);
    }

    #[test]
    fn test_save_updates_index() {
        let (mut library, _temp) = test_library();
        let entry = sample_entry(EntryKind::Zone);
        library.save(&entry).unwrap();

        assert_eq!(library.entries().len(), 1);
        let record = library.get(&entry.id).unwrap();
        assert_eq!(record.kind, EntryKind::Zone);
        assert_eq!(record.data, entry.data);
    }

    #[test]
    fn test_save_overwrites_same_id() {
        let (mut library, _temp) = test_library();
        let mut entry = sample_entry(EntryKind::Item);
        library.save(&entry).unwrap();

        entry.data = json!({"content": "updated"});
        library.save(&entry).unwrap();

        assert_eq!(library.entries().len(), 1);
        assert_eq!(library.read(&entry.id).unwrap().data["content"], "updated");
    }

    #[test]
    fn test_read_unknown_returns_none() {
        let (library, _temp) = test_library();
        assert!(library.read("nope").is_none());
        assert!(library.get("nope").is_none());
        assert!(library.export("nope").is_none());
    }

    #[test]
    fn test_delete_removes_file_index_and_thumbnails() {
        let (mut library, _temp) = test_library();
        let entry = sample_entry(EntryKind::Item);
        library.save(&entry).unwrap();
        library.save_thumbnail(&entry.id, ThumbnailVariant::Full, b"png");
        library.save_thumbnail(&entry.id, ThumbnailVariant::Compact, b"png");

        assert!(library.delete(&entry.id));
        assert!(library.read(&entry.id).is_none());
        assert!(library.entries().is_empty());
        assert!(!library.has_thumbnail(&entry.id, ThumbnailVariant::Full));
        assert!(!library.has_thumbnail(&entry.id, ThumbnailVariant::Compact));
    }

    #[test]
    fn test_delete_unknown_returns_false() {
        let (mut library, _temp) = test_library();
        assert!(!library.delete("missing"));
    }

    #[test]
    fn test_rename_reassigns_identity() {
        let (mut library, _temp) = test_library();
        let entry = sample_entry(EntryKind::Layout);
        library.save(&entry).unwrap();
        library.save_thumbnail(&entry.id, ThumbnailVariant::Full, b"png");

        assert!(library.rename(&entry.id, "srv-42"));

        let renamed = library.read("srv-42").unwrap();
        assert_eq!(renamed.id, "srv-42");
        assert_eq!(renamed.data, entry.data);
        assert!(library.read(&entry.id).is_none());
        assert!(library.get(&entry.id).is_none());
        assert_eq!(library.get("srv-42").unwrap().id, "srv-42");
        assert!(library.has_thumbnail("srv-42", ThumbnailVariant::Full));
    }

    #[test]
    fn test_rename_to_same_id_is_noop() {
        let (mut library, _temp) = test_library();
        let entry = sample_entry(EntryKind::Item);
        library.save(&entry).unwrap();
        assert!(library.rename(&entry.id, &entry.id));
        assert!(library.read(&entry.id).is_some());
    }

    #[test]
    fn test_rename_missing_entry_fails() {
        let (mut library, _temp) = test_library();
        assert!(!library.rename("ghost", "new-id"));
    }

    #[test]
    fn test_import_keeps_server_id() {
        let (mut library, _temp) = test_library();
        let json = serde_json::to_vec(&json!({
            "id": "srv-7",
            "type": "item",
            "createdAt": "2024-01-01T00:00:00Z",
            "data": {"content": "x"}
        }))
        .unwrap();

        let id = library.import(&json).unwrap();
        assert_eq!(id, "srv-7");
        let entry = library.read("srv-7").unwrap();
        assert!(entry.imported_at.is_some());
    }

    #[test]
    fn test_import_assigns_id_when_absent() {
        let (mut library, _temp) = test_library();
        let json = serde_json::to_vec(&json!({
            "id": "",
            "type": "zone",
            "createdAt": "2024-01-01T00:00:00Z",
            "data": {"items": []}
        }))
        .unwrap();

        let id = library.import(&json).unwrap();
        assert!(!id.is_empty());
        assert!(library.read(&id).is_some());
    }

    #[test]
    fn test_import_rejects_garbage() {
        let (mut library, _temp) = test_library();
        assert!(library.import(b"not json").is_none());
        assert!(library
            .import(br#"{"id": "x", "type": "item", "createdAt": "2024-01-01T00:00:00Z", "data": null}"#)
            .is_none());
        assert!(library.entries().is_empty());
    }

    #[test]
    fn test_rebuild_from_documents() {
        let (mut library, temp) = test_library();
        let a = sample_entry(EntryKind::Item);
        let b = sample_entry(EntryKind::Theme);
        library.save(&a).unwrap();
        library.save(&b).unwrap();

        // Simulate a lost index and a stray unparsable file.
        fs::remove_file(temp.path().join("index.json")).unwrap();
        fs::write(temp.path().join("broken.json"), b"{{{").unwrap();

        let reopened = Library::open(temp.path());
        assert_eq!(reopened.entries().len(), 2);
        assert!(reopened.get(&a.id).is_some());
        assert!(reopened.get(&b.id).is_some());
    }

    #[test]
    fn test_rebuild_drops_duplicate_ids() {
        let (mut library, temp) = test_library();
        let entry = sample_entry(EntryKind::Item);
        library.save(&entry).unwrap();

        // A second document claiming the same id (e.g. crash mid-rename).
        let mut twin = entry.clone();
        twin.data = json!({"content": "stale"});
        fs::write(
            temp.path().join("other-file.json"),
            serde_json::to_vec(&twin).unwrap(),
        )
        .unwrap();

        library.rebuild_index();
        assert_eq!(
            library.entries().iter().filter(|r| r.id == entry.id).count(),
            1
        );
    }

    #[test]
    fn test_corrupt_index_triggers_rebuild() {
        let (mut library, temp) = test_library();
        let entry = sample_entry(EntryKind::Zone);
        library.save(&entry).unwrap();

        fs::write(temp.path().join("index.json"), b"not an array").unwrap();
        let reopened = Library::open(temp.path());
        assert_eq!(reopened.entries().len(), 1);
        assert!(reopened.get(&entry.id).is_some());
    }

    #[test]
    fn test_stale_index_without_data_column_triggers_rebuild() {
        let (mut library, temp) = test_library();
        let entry = sample_entry(EntryKind::Item);
        library.save(&entry).unwrap();

        // Pre-data-column index shape.
        fs::write(
            temp.path().join("index.json"),
            serde_json::to_vec(&json!([{
                "id": entry.id,
                "type": "item",
                "createdAt": entry.created_at,
                "tags": []
            }]))
            .unwrap(),
        )
        .unwrap();

        let reopened = Library::open(temp.path());
        let record = reopened.get(&entry.id).unwrap();
        assert_eq!(record.data, entry.data);
    }

    #[test]
    fn test_index_duplicates_cleaned_on_load() {
        let (mut library, temp) = test_library();
        let entry = sample_entry(EntryKind::Item);
        library.save(&entry).unwrap();

        let record = serde_json::to_value(entry.index_record()).unwrap();
        fs::write(
            temp.path().join("index.json"),
            serde_json::to_vec(&json!([record, record])).unwrap(),
        )
        .unwrap();

        let reopened = Library::open(temp.path());
        assert_eq!(reopened.entries().len(), 1);
    }

    #[test]
    fn test_thumbnail_roundtrip() {
        let (library, _temp) = test_library();
        assert!(!library.has_thumbnail("e1", ThumbnailVariant::Full));

        assert!(library.save_thumbnail("e1", ThumbnailVariant::Full, b"full-png"));
        assert!(library.save_thumbnail("e1", ThumbnailVariant::Compact, b"small-png"));

        assert_eq!(
            library.read_thumbnail("e1", ThumbnailVariant::Full).unwrap(),
            b"full-png"
        );
        assert_eq!(
            library
                .read_thumbnail("e1", ThumbnailVariant::Compact)
                .unwrap(),
            b"small-png"
        );
        assert!(library
            .thumbnail_path("e1", ThumbnailVariant::Compact)
            .ends_with("thumbnails/e1_compact.png"));
    }

    #[test]
    fn test_entries_by_kind() {
        let (mut library, _temp) = test_library();
        library.save(&sample_entry(EntryKind::Item)).unwrap();
        library.save(&sample_entry(EntryKind::Theme)).unwrap();
        library.save(&sample_entry(EntryKind::Theme)).unwrap();

        assert_eq!(library.entries_by_kind(EntryKind::Theme).len(), 2);
        assert_eq!(library.entries_by_kind(EntryKind::Item).len(), 1);
        assert_eq!(library.entries_by_kind(EntryKind::Layout).len(), 0);
    }
}
