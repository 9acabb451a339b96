//! Chat events: the unit of the durable log.

use murmur_proto::ServerLine;
use serde::{Deserialize, Serialize};

use crate::session::Identity;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A session completed its handshake
    Connect,
    /// An authenticated session disconnected
    Disconnect,
    /// An authenticated session sent a chat line
    Message,
}

/// One record in the event log.
///
/// Immutable once appended. The identity fields are a copy taken when the
/// event happened, so replay never depends on a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Event kind
    pub kind: EventKind,
    /// Display name of the originating session
    pub username: String,
    /// Color tag of the originating session
    pub color: String,
    /// Chat body for `Message`, empty otherwise
    pub text: String,
}

impl ChatEvent {
    /// A session joined with `identity`.
    pub fn connect(identity: &Identity) -> Self {
        Self::new(EventKind::Connect, identity, String::new())
    }

    /// A session with `identity` left.
    pub fn disconnect(identity: &Identity) -> Self {
        Self::new(EventKind::Disconnect, identity, String::new())
    }

    /// A session with `identity` said `text`.
    pub fn message(identity: &Identity, text: impl Into<String>) -> Self {
        Self::new(EventKind::Message, identity, text.into())
    }

    fn new(kind: EventKind, identity: &Identity, text: String) -> Self {
        Self { kind, username: identity.name.clone(), color: identity.color.clone(), text }
    }

    /// The line a client is shown when this event is replayed.
    pub fn to_line(&self) -> ServerLine {
        match self.kind {
            EventKind::Connect => ServerLine::Joined { name: self.username.clone() },
            EventKind::Disconnect => ServerLine::Left { name: self.username.clone() },
            EventKind::Message => ServerLine::Chat {
                name: self.username.clone(),
                color: self.color.clone(),
                text: self.text.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("Alice", "FF0000")
    }

    #[test]
    fn connect_and_disconnect_have_empty_text() {
        assert!(ChatEvent::connect(&alice()).text.is_empty());
        assert!(ChatEvent::disconnect(&alice()).text.is_empty());
    }

    #[test]
    fn replay_lines_use_stored_identity() {
        let event = ChatEvent::message(&alice(), "hello");

        assert_eq!(event.to_line().render(), "<color=#FF0000>Alice: hello</color>");
        assert_eq!(ChatEvent::connect(&alice()).to_line().render(), "* 'Alice' entered the chat");
        assert_eq!(ChatEvent::disconnect(&alice()).to_line().render(), "* 'Alice' left the chat");
    }

    #[test]
    fn cbor_encoding_preserves_event() {
        let event = ChatEvent::message(&alice(), "hi there");

        let mut bytes = Vec::new();
        ciborium::into_writer(&event, &mut bytes).unwrap();
        let decoded: ChatEvent = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(decoded, event);
    }
}
