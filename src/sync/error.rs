//! Sync error types.

use thiserror::Error;

/// Errors reported by community catalog operations.
///
/// A content conflict (409) is deliberately not an error: the server answers
/// with the pre-existing id and the client converges onto it, so upload
/// reports it as a successful outcome instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("request failed: {0}")]
    Network(String),

    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to import downloaded entry")]
    Import,

    #[error("failed to persist local entry: {0}")]
    Persistence(String),
}

impl SyncError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        SyncError::Network(e.to_string())
    }
}
