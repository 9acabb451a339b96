//! Handshake payload.
//!
//! The first payload on every connection establishes the peer's identity:
//!
//! ```text
//! FF0000Alice
//! └─┬──┘└─┬─┘
//!  color  display name (may be empty)
//! ```
//!
//! There is no separator. The color tag is always exactly
//! [`COLOR_TAG_LEN`] characters; everything after it is the name.

use std::fmt;

use crate::errors::{DecodeError, HandshakeError};

/// Number of characters in a color tag (`RRGGBB`).
pub const COLOR_TAG_LEN: usize = 6;

/// Decode a payload as UTF-8 text.
///
/// # Errors
///
/// - `DecodeError` if the bytes are not valid UTF-8.
pub fn decode_text(payload: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(payload).map_err(|e| DecodeError { valid_up_to: e.valid_up_to() })
}

/// Parsed handshake: a color tag and a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Six-character color tag, e.g. `FF0000`
    pub color: String,
    /// Display name, possibly empty
    pub name: String,
}

impl Handshake {
    /// Build a handshake from its parts.
    pub fn new(color: impl Into<String>, name: impl Into<String>) -> Self {
        Self { color: color.into(), name: name.into() }
    }

    /// Parse a handshake payload.
    ///
    /// The split is by characters, not bytes, so a multi-byte character in the
    /// first six positions never splits a code point.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::TooShort` if `text` has fewer than
    ///   [`COLOR_TAG_LEN`] characters.
    pub fn parse(text: &str) -> Result<Self, HandshakeError> {
        let split = match text.char_indices().nth(COLOR_TAG_LEN) {
            Some((idx, _)) => idx,
            None => {
                let len = text.chars().count();
                if len < COLOR_TAG_LEN {
                    return Err(HandshakeError::TooShort { len, min: COLOR_TAG_LEN });
                }
                text.len()
            },
        };

        let (color, name) = text.split_at(split);

        debug_assert_eq!(color.chars().count(), COLOR_TAG_LEN);

        Ok(Self::new(color, name))
    }

    /// Wire form of this handshake.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.color, self.name)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn color_is_first_six_chars(
            color in "[0-9A-Fa-f]{6}",
            name in "\\PC*",
        ) {
            let payload = format!("{color}{name}");
            let handshake = Handshake::parse(&payload).expect("long enough");

            prop_assert_eq!(handshake.color, color);
            prop_assert_eq!(handshake.name, name);
        }

        #[test]
        fn short_payloads_always_rejected(text in "\\PC{0,5}") {
            prop_assert!(
                matches!(Handshake::parse(&text), Err(HandshakeError::TooShort { .. })),
                "expected TooShort for {:?}", text
            );
        }
    }

    #[test]
    fn parse_color_and_name() {
        let handshake = Handshake::parse("FF0000Alice").unwrap();

        assert_eq!(handshake.color, "FF0000");
        assert_eq!(handshake.name, "Alice");
    }

    #[test]
    fn exactly_six_chars_gives_empty_name() {
        let handshake = Handshake::parse("00FF00").unwrap();

        assert_eq!(handshake.color, "00FF00");
        assert_eq!(handshake.name, "");
    }

    #[test]
    fn five_chars_is_too_short() {
        let result = Handshake::parse("FF000");

        assert_eq!(result, Err(HandshakeError::TooShort { len: 5, min: 6 }));
    }

    #[test]
    fn empty_is_too_short() {
        assert_eq!(Handshake::parse(""), Err(HandshakeError::TooShort { len: 0, min: 6 }));
    }

    #[test]
    fn name_keeps_spaces_and_unicode() {
        let handshake = Handshake::parse("0000FF Jürgen ✓").unwrap();

        assert_eq!(handshake.name, " Jürgen ✓");
    }

    #[test]
    fn split_counts_characters_not_bytes() {
        let handshake = Handshake::parse("ééééééBob").unwrap();

        assert_eq!(handshake.color, "éééééé");
        assert_eq!(handshake.name, "Bob");
    }

    #[test]
    fn encode_is_concatenation() {
        assert_eq!(Handshake::new("FF0000", "Alice").encode(), "FF0000Alice");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let result = decode_text(&[b'o', b'k', 0xFF, 0xFE]);

        assert_eq!(result, Err(DecodeError { valid_up_to: 2 }));
    }

    #[test]
    fn decode_accepts_text() {
        assert_eq!(decode_text("hello".as_bytes()), Ok("hello"));
    }
}
