//! Error types for index building and querying.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side
//! is the [`IndexError`] enum. A query that finds nothing is never an error;
//! errors always mean the operation could not complete (I/O failure, a corrupt
//! file, a build that ran out of memory or was cancelled).

use std::io;

use thiserror::Error;

/// The error type for all index operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// I/O failure opening, reading or writing a backing file.
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),

    /// A build exceeded its memory ceiling and cannot spill.
    #[error("Out of memory while building index: {0}")]
    BuildMemory(String),

    /// A build observed the cancellation flag at a checkpoint.
    #[error("Index build cancelled")]
    BuildCancelled,

    /// A persisted structure failed a sanity check on load.
    #[error("Malformed index: {0}")]
    Malformed(String),

    /// Configuration rejected at validation time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The index files were released by `close()`.
    #[error("Index is closed")]
    Closed,

    /// Metadata or configuration (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Create a malformed-index error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        IndexError::Malformed(msg.into())
    }

    /// Create an out-of-memory build error.
    pub fn build_memory<S: Into<String>>(msg: S) -> Self {
        IndexError::BuildMemory(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        IndexError::InvalidConfig(msg.into())
    }

    /// Storage error for a buffer that ended in the middle of a value.
    pub fn truncated(what: &str) -> Self {
        IndexError::Storage(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("truncated {}", what),
        ))
    }

    /// Whether this error left the previous index generation untouched by
    /// design (cancelled or out of memory) rather than failing on I/O.
    pub fn is_build_abort(&self) -> bool {
        matches!(self, IndexError::BuildCancelled | IndexError::BuildMemory(_))
    }
}
