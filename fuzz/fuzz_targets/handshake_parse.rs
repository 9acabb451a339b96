//! Fuzz target for handshake parsing
//!
//! # Invariants
//!
//! - Arbitrary bytes never panic the UTF-8 check or the parser
//! - An accepted handshake splits into a 6-character color and the rest
//! - Re-encoding an accepted handshake gives back the input text

#![no_main]

use libfuzzer_sys::fuzz_target;
use murmur_proto::{COLOR_TAG_LEN, Handshake, decode_text};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = decode_text(data) else {
        return;
    };

    match Handshake::parse(text) {
        Ok(handshake) => {
            assert_eq!(handshake.color.chars().count(), COLOR_TAG_LEN);
            assert_eq!(handshake.encode(), text);
        },
        Err(_) => assert!(text.chars().count() < COLOR_TAG_LEN),
    }
});
