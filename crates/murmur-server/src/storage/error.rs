//! Storage error types.

use thiserror::Error;

/// Errors from the event log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying storage failed (disk, transaction, lock)
    #[error("storage I/O error: {0}")]
    Io(String),

    /// An event could not be encoded or a stored record could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Returns true if retrying the same operation may succeed.
    ///
    /// I/O failures are treated as transient. Serialization failures are
    /// deterministic: the same event will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
