//! Server to client lines.
//!
//! Clients render these verbatim; chat lines carry rich-text color markup
//! built from the sender's color tag.

use std::fmt;

/// A line the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Someone completed the handshake
    Joined {
        /// Display name of the new participant
        name: String,
    },

    /// An authenticated participant disconnected
    Left {
        /// Display name of the departed participant
        name: String,
    },

    /// A chat message
    Chat {
        /// Sender display name
        name: String,
        /// Sender color tag
        color: String,
        /// Message text, verbatim
        text: String,
    },
}

impl ServerLine {
    /// Wire form of this line.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined { name } => write!(f, "* '{name}' entered the chat"),
            Self::Left { name } => write!(f, "* '{name}' left the chat"),
            Self::Chat { name, color, text } => {
                write!(f, "<color=#{color}>{name}: {text}</color>")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_line() {
        let line = ServerLine::Joined { name: "Alice".to_string() };
        insta::assert_snapshot!(line.render(), @"* 'Alice' entered the chat");
    }

    #[test]
    fn left_line() {
        let line = ServerLine::Left { name: "Alice".to_string() };
        insta::assert_snapshot!(line.render(), @"* 'Alice' left the chat");
    }

    #[test]
    fn chat_line() {
        let line = ServerLine::Chat {
            name: "Alice".to_string(),
            color: "FF0000".to_string(),
            text: "hello".to_string(),
        };
        insta::assert_snapshot!(line.render(), @"<color=#FF0000>Alice: hello</color>");
    }

    #[test]
    fn empty_name_still_quoted() {
        let line = ServerLine::Joined { name: String::new() };
        assert_eq!(line.render(), "* '' entered the chat");
    }
}
