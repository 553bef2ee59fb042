//! Error types for the sync, backup, and query paths.

use thiserror::Error;

/// Errors that can occur while syncing, backing up, or querying the
/// schedule store.
///
/// Row-level errors (`MalformedEntry`) are recovered inside a refresh
/// cycle; cycle-level errors are logged and the cycle is skipped. Only
/// startup errors are fatal, and those are handled in `main`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network/HTTP request failed
    #[error("network error: {message}")]
    Network { message: String },

    /// Upstream returned something other than the expected JSON shape
    #[error("unexpected upstream response: {message}")]
    UnexpectedResponse { message: String },

    /// A single schedule or roster entry is missing required fields
    #[error("malformed entry: {reason}")]
    MalformedEntry { reason: String },

    /// The backing store rejected an operation
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A snapshot file exists but could not be parsed
    #[error("snapshot {name:?} is malformed: {message}")]
    MalformedSnapshot { name: String, message: String },

    /// Filesystem failure while reading or writing snapshot files
    #[error("backup I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns true if this error only affects a single row and the
    /// enclosing cycle should continue.
    pub fn is_row_level(&self) -> bool {
        matches!(self, SyncError::MalformedEntry { .. })
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::UnexpectedResponse {
            message: format!("bad upstream URL: {err}"),
        }
    }
}
