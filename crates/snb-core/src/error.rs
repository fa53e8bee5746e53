//! Error taxonomy shared by every snb-core operation.
//!
//! Each variant carries the path it concerns so front ends can show the user
//! which file or folder failed and why.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// An expected file or directory does not exist
    #[error("not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The archive exists but cannot be parsed or read
    #[error("corrupt archive {}: {reason}", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    /// User input was rejected
    #[error("invalid input: {0}")]
    Validation(String),

    /// Generic read/write failure
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Counter file does not hold a non-negative integer
    #[error("counter file {} holds {content:?}, expected a non-negative integer", .path.display())]
    Counter { path: PathBuf, content: String },

    /// Counter already holds the largest sequence number
    #[error("counter file {} is at the largest sequence number", .path.display())]
    CounterExhausted { path: PathBuf },

    /// Settings file could not be encoded or decoded
    #[error("settings file {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound { path: path.into() }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptArchive { path: path.into(), reason: reason.to_string() }
    }

    /// Maps an open/read failure on `path`, turning `ENOENT` into `NotFound`.
    pub(crate) fn from_io_at(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Error::not_found(path)
        } else {
            Error::io(path, source)
        }
    }

    /// Exit-code style classification used by the front ends.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
