//! Length-prefixed transport framing.
//!
//! Every payload travels as a single frame:
//!
//! ```text
//! ┌──────────────────┬───────────────────────┐
//! │ len: u32 (BE)    │ payload: len bytes    │
//! └──────────────────┴───────────────────────┘
//! ```
//!
//! The codec is stateless apart from the size limit, so the same value can be
//! shared by the reader and writer halves of a connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::FrameError;

/// Size of the length prefix in bytes.
pub const HEADER_SIZE: usize = 4;

/// Encoder/decoder for length-prefixed frames.
///
/// # Invariants
///
/// - Size Limit: no frame with a payload larger than `max_message_size` is
///   ever produced by [`FrameCodec::encode`] or accepted by
///   [`FrameCodec::decode`]. The limit is checked against the announced length
///   before any payload bytes are buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_message_size: usize,
}

impl FrameCodec {
    /// Create a codec with the given payload size limit.
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Largest payload this codec accepts.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Append one frame carrying `payload` to `dst`.
    ///
    /// # Errors
    ///
    /// - `FrameError::MessageTooLarge` if the payload exceeds the limit. Nothing
    ///   is written in that case.
    pub fn encode(&self, payload: &[u8], dst: &mut impl BufMut) -> Result<(), FrameError> {
        let len = self.check_size(payload.len())?;

        dst.put_u32(len);
        dst.put_slice(payload);

        Ok(())
    }

    /// Encode `payload` into a fresh buffer.
    pub fn encode_to_bytes(&self, payload: &[u8]) -> Result<Bytes, FrameError> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        self.encode(payload, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Pop the next complete frame from `src`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed bytes are
    /// removed from `src`; a partial frame is left in place.
    ///
    /// # Errors
    ///
    /// - `FrameError::MessageTooLarge` if the announced length exceeds the
    ///   limit. The stream cannot be resynchronised after this.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let announced = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if announced > self.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: announced,
                max: self.max_message_size,
            });
        }

        let total = HEADER_SIZE + announced;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(announced).freeze();

        debug_assert_eq!(payload.len(), announced);

        Ok(Some(payload))
    }

    /// Like [`FrameCodec::decode`], but for the final read of a stream.
    ///
    /// Leftover bytes that do not form a complete frame are an error.
    pub fn decode_eof(&self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let expected = if src.len() >= HEADER_SIZE {
            u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize
        } else {
            HEADER_SIZE
        };

        Err(FrameError::Truncated {
            expected,
            actual: src.len().saturating_sub(HEADER_SIZE),
        })
    }

    fn check_size(&self, size: usize) -> Result<u32, FrameError> {
        let too_large = FrameError::MessageTooLarge { size, max: self.max_message_size };

        if size > self.max_message_size {
            return Err(too_large);
        }

        u32::try_from(size).map_err(|_| too_large)
    }
}
