//! Per-connection protocol state machine.
//!
//! Uses the action pattern: methods take the inbound payload and return the
//! effects for the driver to execute, in order. The state machine itself does
//! no I/O, which keeps every transition testable without a socket or a log.
//!
//! # State Machine
//!
//! ```text
//!                     valid handshake
//! ┌─────────────────┐ ───────────────> ┌────────┐
//! │ Unauthenticated │                  │ Active │ <──┐ chat payload
//! └─────────────────┘                  └────────┘ ───┘
//!    │  ↑ bad payload                      │
//!    └──┘ (dropped)                        │ disconnect
//!    │                                     ↓
//!    │ disconnect                   leave broadcast + Disconnect event
//!    ↓                                     │
//!  removed <───────────────────────────────┘
//! ```

use murmur_proto::{Handshake, ServerLine, decode_text};

use crate::{error::SessionError, event::ChatEvent};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for the handshake payload
    Unauthenticated,
    /// Handshake accepted; payloads are chat text
    Active,
}

/// Identity established by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Display name
    pub name: String,
    /// Six-character color tag
    pub color: String,
}

impl Identity {
    /// Build an identity.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self { name: name.into(), color: color.into() }
    }
}

impl From<Handshake> for Identity {
    fn from(handshake: Handshake) -> Self {
        Self { name: handshake.name, color: handshake.color }
    }
}

/// Effects produced by a session transition.
///
/// The driver must execute them in the order returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send the most recent history to this session only
    ReplayHistory,

    /// Send `line` to every registered session except `exclude`
    Broadcast {
        /// Line to fan out
        line: ServerLine,
        /// Session that must not receive it
        exclude: Option<u64>,
    },

    /// Append an event to the durable log
    Append(ChatEvent),
}

/// Server-side state for one live connection.
///
/// # Invariants
///
/// - `state == Active` if and only if `identity.is_some()`.
/// - The identity is set exactly once and never changes afterwards.
#[derive(Debug, Clone)]
pub struct Session {
    id: u64,
    state: SessionState,
    identity: Option<Identity>,
}

impl Session {
    /// Create a new unauthenticated session for transport connection `id`.
    pub fn new(id: u64) -> Self {
        Self { id, state: SessionState::Unauthenticated, identity: None }
    }

    /// Transport-assigned connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake has completed.
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Identity from the handshake. `None` until authenticated.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Display name. `None` until authenticated.
    pub fn display_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.name.as_str())
    }

    /// Color tag. `None` until authenticated.
    pub fn color_tag(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.color.as_str())
    }

    /// Process an inbound payload.
    ///
    /// While unauthenticated the payload is a handshake; on success the
    /// session becomes active and the returned actions are: replay history,
    /// broadcast the join line to everyone (this session included), append a
    /// Connect event.
    ///
    /// While active the payload is chat text; the actions are: broadcast the
    /// chat line to everyone (sender included), append a Message event.
    ///
    /// # Errors
    ///
    /// - `SessionError::Decode` if the payload is not UTF-8
    /// - `SessionError::Handshake` if the handshake is too short
    ///
    /// On error the state is unchanged and there are no effects.
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        let text = decode_text(payload)?;

        match &self.identity {
            None => self.handle_handshake(text),
            Some(identity) => Ok(vec![
                SessionAction::Broadcast {
                    line: ServerLine::Chat {
                        name: identity.name.clone(),
                        color: identity.color.clone(),
                        text: text.to_string(),
                    },
                    exclude: None,
                },
                SessionAction::Append(ChatEvent::message(identity, text)),
            ]),
        }
    }

    /// Effects of this session's connection going away.
    ///
    /// An unauthenticated session leaves silently. An active one broadcasts
    /// the leave line to everyone else and appends a Disconnect event. The
    /// caller removes the session from the registry afterwards.
    pub fn handle_disconnect(&self) -> Vec<SessionAction> {
        let Some(identity) = &self.identity else {
            return Vec::new();
        };

        vec![
            SessionAction::Broadcast {
                line: ServerLine::Left { name: identity.name.clone() },
                exclude: Some(self.id),
            },
            SessionAction::Append(ChatEvent::disconnect(identity)),
        ]
    }

    fn handle_handshake(&mut self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        debug_assert_eq!(self.state, SessionState::Unauthenticated);

        let identity = Identity::from(Handshake::parse(text)?);

        let actions = vec![
            SessionAction::ReplayHistory,
            SessionAction::Broadcast {
                line: ServerLine::Joined { name: identity.name.clone() },
                exclude: None,
            },
            SessionAction::Append(ChatEvent::connect(&identity)),
        ];

        self.identity = Some(identity);
        self.state = SessionState::Active;

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use murmur_proto::HandshakeError;

    use super::*;
    use crate::event::EventKind;

    #[test]
    fn new_session_is_unauthenticated() {
        let session = Session::new(7);

        assert_eq!(session.id(), 7);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.identity().is_none());
    }

    #[test]
    fn handshake_activates_session() {
        let mut session = Session::new(1);

        let actions = session.handle_payload(b"FF0000Alice").unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.display_name(), Some("Alice"));
        assert_eq!(session.color_tag(), Some("FF0000"));

        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], SessionAction::ReplayHistory);
        assert_eq!(
            actions[1],
            SessionAction::Broadcast {
                line: ServerLine::Joined { name: "Alice".to_string() },
                exclude: None,
            }
        );
        assert!(matches!(&actions[2], SessionAction::Append(e) if e.kind == EventKind::Connect));
    }

    #[test]
    fn short_handshake_keeps_session_unauthenticated() {
        let mut session = Session::new(1);

        let result = session.handle_payload(b"FF00");

        assert_eq!(
            result,
            Err(SessionError::Handshake(HandshakeError::TooShort { len: 4, min: 6 }))
        );
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn invalid_utf8_handshake_is_dropped() {
        let mut session = Session::new(1);

        let result = session.handle_payload(&[0xC3, 0x28, b'a', b'b', b'c', b'd', b'e']);

        assert!(matches!(result, Err(SessionError::Decode(_))));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn session_can_retry_handshake_after_failure() {
        let mut session = Session::new(1);

        assert!(session.handle_payload(b"abc").is_err());
        assert!(session.handle_payload(b"00FF00Bob").is_ok());
        assert_eq!(session.display_name(), Some("Bob"));
    }

    #[test]
    fn second_payload_is_chat_not_handshake() {
        let mut session = Session::new(1);
        session.handle_payload(b"FF0000Alice").unwrap();

        let actions = session.handle_payload(b"00FF00Mallory").unwrap();

        // Identity is immutable after the handshake
        assert_eq!(session.display_name(), Some("Alice"));
        assert_eq!(
            actions[0],
            SessionAction::Broadcast {
                line: ServerLine::Chat {
                    name: "Alice".to_string(),
                    color: "FF0000".to_string(),
                    text: "00FF00Mallory".to_string(),
                },
                exclude: None,
            }
        );
        assert_eq!(
            actions[1],
            SessionAction::Append(ChatEvent::message(&Identity::new("Alice", "FF0000"), "00FF00Mallory"))
        );
    }

    #[test]
    fn short_chat_text_is_accepted() {
        let mut session = Session::new(1);
        session.handle_payload(b"FF0000Alice").unwrap();

        let actions = session.handle_payload(b"").unwrap();
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn invalid_utf8_chat_is_dropped_without_effects() {
        let mut session = Session::new(1);
        session.handle_payload(b"FF0000Alice").unwrap();

        assert!(session.handle_payload(&[0xFF]).is_err());
        assert!(session.is_authenticated());
    }

    #[test]
    fn unauthenticated_disconnect_is_silent() {
        let session = Session::new(1);
        assert!(session.handle_disconnect().is_empty());
    }

    #[test]
    fn active_disconnect_excludes_self() {
        let mut session = Session::new(9);
        session.handle_payload(b"FF0000Alice").unwrap();

        let actions = session.handle_disconnect();

        assert_eq!(
            actions[0],
            SessionAction::Broadcast {
                line: ServerLine::Left { name: "Alice".to_string() },
                exclude: Some(9),
            }
        );
        assert!(matches!(&actions[1], SessionAction::Append(e) if e.kind == EventKind::Disconnect));
    }
}
