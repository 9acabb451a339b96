//! Murmur wire protocol.
//!
//! Everything a peer needs to talk to the murmur server, with no I/O:
//!
//! - [`FrameCodec`]: length-prefixed transport framing
//!   (`[len: u32 BE][payload]`) with a maximum message size.
//! - [`Handshake`]: the first payload on a connection, `<color><name>`.
//! - [`ServerLine`]: the human-readable lines the server sends back.
//!
//! Payloads are UTF-8 text. Use [`decode_text`] before interpreting one.

#![forbid(unsafe_code)]

pub mod errors;
mod frame;
mod handshake;
mod line;

pub use errors::{DecodeError, FrameError, HandshakeError};
pub use frame::{FrameCodec, HEADER_SIZE};
pub use handshake::{COLOR_TAG_LEN, Handshake, decode_text};
pub use line::ServerLine;
