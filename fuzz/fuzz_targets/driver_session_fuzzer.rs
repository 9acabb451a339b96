//! Fuzz target for the server driver
//!
//! Drives arbitrary connect/payload/close sequences through `ServerDriver`.
//!
//! # Invariants
//!
//! - Never panics, whatever the payloads or event order
//! - Unauthenticated sessions never cause a broadcast or a persisted event
//! - Broadcast recipients are always live sessions, handshake or not
//! - Registry size matches connects minus closes

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use murmur_server::{DriverConfig, MemoryStorage, ServerAction, ServerDriver, ServerEvent};

#[derive(Debug, Arbitrary)]
enum Op {
    Connect,
    Payload { target: u8, bytes: Vec<u8> },
    Close { target: u8 },
}

fuzz_target!(|ops: Vec<Op>| {
    let mut driver = ServerDriver::new(MemoryStorage::new(), DriverConfig { replay_window: 8 });
    let mut live: Vec<u64> = Vec::new();
    let mut next_id = 1;

    for op in ops {
        let (event, sender) = match op {
            Op::Connect => {
                let id = next_id;
                next_id += 1;
                live.push(id);
                (ServerEvent::ConnectionAccepted { session_id: id }, None)
            },
            Op::Payload { target, bytes } => {
                // Unknown ids are allowed and must be rejected cleanly
                let id = live.get(usize::from(target)).copied().unwrap_or(u64::from(target) + 10_000);
                (ServerEvent::PayloadReceived { session_id: id, payload: Bytes::from(bytes) }, Some(id))
            },
            Op::Close { target } => {
                let index = usize::from(target);
                let id = if index < live.len() { live.remove(index) } else { u64::from(target) + 10_000 };
                (ServerEvent::ConnectionClosed { session_id: id, reason: "fuzz".to_string() }, None)
            },
        };

        let was_active = sender
            .and_then(|id| driver.registry().get(id))
            .is_some_and(|s| s.is_authenticated());

        let Ok(actions) = driver.process_event(event) else {
            continue;
        };

        for action in &actions {
            match action {
                ServerAction::Broadcast { recipients, .. } => {
                    for id in recipients {
                        assert!(live.contains(id));
                    }
                },
                ServerAction::PersistEvent { .. } => {
                    if let Some(id) = sender {
                        // Either it was already active, or this payload authenticated it
                        assert!(was_active || driver.registry().get(id).is_some_and(|s| s.is_authenticated()));
                    }
                },
                _ => {},
            }
        }

        assert_eq!(driver.session_count(), live.len());
    }
});
