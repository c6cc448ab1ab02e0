//! Queue error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading or writing the persisted queue. Any of these aborts
/// the current drain cycle; in-memory state is left as it was.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Filesystem error on the queue file
    #[error("Queue file I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Queue file exists but does not parse
    #[error("Queue file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Queue file written by an incompatible version
    #[error("Queue file {} has unsupported version {version}", path.display())]
    UnsupportedVersion { path: PathBuf, version: u32 },

    /// Serialization error while writing
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;
