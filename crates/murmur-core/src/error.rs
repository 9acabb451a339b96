//! Error types for the session state machine.
//!
//! None of these are fatal: the offending payload is dropped and the session
//! stays in whatever state it was in.

use murmur_proto::{DecodeError, HandshakeError};
use thiserror::Error;

/// Errors from feeding a payload into a [`Session`](crate::Session).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Payload is not UTF-8 text
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Handshake payload is malformed
    #[error("handshake rejected: {0}")]
    Handshake(#[from] HandshakeError),
}
