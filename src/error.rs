//! Error types for navsplit.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading log sources.
///
/// Malformed log lines are never errors; they are dropped during extraction.
#[derive(Error, Debug)]
pub enum Error {
    /// A log source or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A condition's log directory does not exist.
    #[error("{} not found", .0.display())]
    MissingDirectory(PathBuf),

    /// A report could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for navsplit.
pub type Result<T> = std::result::Result<T, Error>;
