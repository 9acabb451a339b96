//! Property-based tests for the session state machine
//!
//! These tests drive sessions with arbitrary payload sequences and verify the
//! invariants that must hold regardless of input.

use murmur_core::{EventKind, Session, SessionAction, SessionState};
use proptest::prelude::*;

/// Payloads a hostile or buggy peer might send
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        // Too short for a handshake
        prop::collection::vec(any::<u8>(), 0..6),
        // Plausible handshakes
        ("[0-9A-F]{6}", "[a-zA-Z ]{0,12}").prop_map(|(c, n)| format!("{c}{n}").into_bytes()),
        // Arbitrary bytes, often not UTF-8
        prop::collection::vec(any::<u8>(), 0..64),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: no broadcast or append is produced before authentication,
    /// except by the transition that authenticates
    #[test]
    fn prop_no_effects_while_unauthenticated(
        payloads in prop::collection::vec(payload(), 1..20)
    ) {
        let mut session = Session::new(1);

        for payload in &payloads {
            let was_authenticated = session.is_authenticated();

            match session.handle_payload(payload) {
                Ok(actions) => {
                    prop_assert!(session.is_authenticated());
                    if !was_authenticated {
                        // The handshake transition itself
                        prop_assert_eq!(actions.len(), 3);
                        prop_assert_eq!(&actions[0], &SessionAction::ReplayHistory);
                    }
                },
                Err(_) => {
                    prop_assert_eq!(session.is_authenticated(), was_authenticated);
                },
            }
        }
    }

    /// Property: the identity never changes once set
    #[test]
    fn prop_identity_is_immutable(
        handshake in "[0-9A-F]{6}[a-z]{1,8}",
        payloads in prop::collection::vec(payload(), 0..20)
    ) {
        let mut session = Session::new(1);
        session.handle_payload(handshake.as_bytes()).expect("valid handshake");
        let identity = session.identity().cloned();

        for payload in &payloads {
            let _ = session.handle_payload(payload);
            prop_assert_eq!(session.identity().cloned(), identity.clone());
            prop_assert_eq!(session.state(), SessionState::Active);
        }
    }

    /// Property: every accepted chat payload yields exactly one Message event
    #[test]
    fn prop_chat_appends_exactly_one_message(text in "\\PC{0,64}") {
        let mut session = Session::new(1);
        session.handle_payload(b"FF0000Alice").expect("valid handshake");

        let actions = session.handle_payload(text.as_bytes()).expect("utf-8 text");

        let appended: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Append(event) => Some(event),
                _ => None,
            })
            .collect();

        prop_assert_eq!(appended.len(), 1);
        prop_assert_eq!(appended[0].kind, EventKind::Message);
        prop_assert_eq!(&appended[0].text, &text);
    }
}
