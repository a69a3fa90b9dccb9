mod entry;

pub use entry::{BrowseQuery, Entry, EntryKind, IndexRecord, RemoteEntry, ENVELOPE_VERSION};
