//! Driver and executor error types.
//!
//! Provides strongly-typed errors for server operations:
//! - Session management (registration, lookup)
//! - Payload handling (decode, handshake)
//! - Action execution (send, persist)
//!
//! None of these stop the dispatch loop. They are logged and the next event
//! is processed.

use murmur_core::SessionError;
use thiserror::Error;

use crate::storage::StorageError;

/// Registry contract violations reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connect event for an id that is already registered.
    ///
    /// The transport must never reuse a live id, so this is a transport bug.
    #[error("session already registered: {0}")]
    AlreadyRegistered(u64),

    /// Data or disconnect event for an id that is not registered.
    #[error("session not found: {0}")]
    NotFound(u64),
}

/// Errors from `ServerDriver::process_event`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Connect/disconnect/data referenced an unknown or duplicate id
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Payload was dropped by the session state machine
    #[error("payload from session {session_id} dropped: {source}")]
    Session {
        /// Session that sent the payload
        session_id: u64,
        /// Why it was dropped
        #[source]
        source: SessionError,
    },
}

/// Errors from executing server actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Send to session failed.
    ///
    /// The connection is closed or the line exceeds the message size limit.
    /// Other recipients of the same broadcast are unaffected.
    #[error("send failed for session {session_id}: {reason}")]
    SendFailed {
        /// Session that failed
        session_id: u64,
        /// Error message
        reason: String,
    },

    /// Appending to the event log failed after all retries.
    ///
    /// Deliveries already made for the event are not rolled back.
    #[error("storage failed after {attempts} attempt(s): {source}")]
    StorageFailed {
        /// Attempts made, first try included
        attempts: u32,
        /// Last storage error
        #[source]
        source: StorageError,
    },
}
