//! Error types for the wire protocol.

use thiserror::Error;

/// Payload bytes are not valid UTF-8 text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("payload is not valid UTF-8 (valid up to byte {valid_up_to})")]
pub struct DecodeError {
    /// Length of the longest valid UTF-8 prefix
    pub valid_up_to: usize,
}

/// Handshake payload could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Fewer characters than the color tag requires
    #[error("handshake too short: {len} characters, need at least {min}")]
    TooShort {
        /// Characters received
        len: usize,
        /// Characters required
        min: usize,
    },
}

/// Transport framing errors.
///
/// Any of these on an inbound stream means the peer is out of sync and the
/// connection should be closed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Message length exceeds the configured maximum
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge {
        /// Announced or actual payload size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Stream ended in the middle of a frame
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the header promised
        expected: usize,
        /// Bytes available
        actual: usize,
    },
}
