//! Fuzz target for FrameCodec::decode
//!
//! Feeds arbitrary bytes, split at arbitrary points, through the streaming
//! decoder to find:
//! - Panics on malformed length prefixes
//! - Frames larger than the configured limit slipping through
//! - Bytes lost or duplicated across chunk boundaries
//!
//! The fuzzer should NEVER panic. Invalid input must end in an error.

#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use murmur_proto::{FrameCodec, HEADER_SIZE};

#[derive(Debug, Arbitrary)]
struct Input {
    max_message_size: u16,
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    let codec = FrameCodec::new(usize::from(input.max_message_size));
    let mut buf = BytesMut::new();
    let mut fed = 0usize;
    let mut consumed = 0usize;

    for chunk in &input.chunks {
        buf.extend_from_slice(chunk);
        fed += chunk.len();

        loop {
            match codec.decode(&mut buf) {
                Ok(Some(payload)) => {
                    assert!(payload.len() <= codec.max_message_size());
                    consumed += HEADER_SIZE + payload.len();
                },
                Ok(None) => break,
                Err(_) => return,
            }
        }

        assert_eq!(consumed + buf.len(), fed);
    }

    match codec.decode_eof(&mut buf) {
        Ok(Some(payload)) => assert!(payload.len() <= codec.max_message_size()),
        Ok(None) => assert!(buf.is_empty()),
        Err(_) => {},
    }
});
