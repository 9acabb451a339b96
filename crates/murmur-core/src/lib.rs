//! Murmur core: session logic without I/O.
//!
//! # Architecture
//!
//! Each connection owns a [`Session`], a two-state machine
//! (`Unauthenticated` then `Active`). Feeding it a payload returns a list of
//! [`SessionAction`]s in the order they must be carried out: replay history,
//! broadcast, append to the event log. The server driver resolves those
//! actions against the registry and storage; nothing in this crate touches a
//! socket or a file.
//!
//! [`ChatEvent`] is the unit of the durable log. It carries a copy of the
//! sender's identity so history can be replayed long after the session that
//! produced it is gone.

#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod session;

pub use error::SessionError;
pub use event::{ChatEvent, EventKind};
pub use session::{Identity, Session, SessionAction, SessionState};
