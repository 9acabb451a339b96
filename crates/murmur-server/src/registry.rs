//! Session registry.
//!
//! Owns every live [`Session`], keyed by the transport-assigned connection
//! id. Sessions are inserted on connect and removed on disconnect; nothing
//! else holds on to them. Iteration is in ascending id order, so broadcast
//! snapshots are deterministic.

use std::collections::{BTreeMap, btree_map::Entry};

use murmur_core::Session;

use crate::server_error::RegistryError;

/// Registry of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Session ID → session
    sessions: BTreeMap<u64, Session>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new unauthenticated session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyRegistered` if `session_id` is live. The
    ///   existing session is left untouched.
    pub fn register(&mut self, session_id: u64) -> Result<(), RegistryError> {
        match self.sessions.entry(session_id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(session_id)),
            Entry::Vacant(slot) => {
                slot.insert(Session::new(session_id));
                Ok(())
            },
        }
    }

    /// Remove a session, returning it if it existed.
    pub fn unregister(&mut self, session_id: u64) -> Option<Session> {
        self.sessions.remove(&session_id)
    }

    /// Session for `session_id`. `None` if not registered.
    pub fn get(&self, session_id: u64) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    /// Mutable session for `session_id`. `None` if not registered.
    pub fn get_mut(&mut self, session_id: u64) -> Option<&mut Session> {
        self.sessions.get_mut(&session_id)
    }

    /// Check if a session is registered.
    pub fn contains(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// All sessions, in ascending id order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.sessions.values()
    }

    /// Ids of every registered session except `exclude`, ascending.
    ///
    /// This is the recipient snapshot for a broadcast. Sessions still in the
    /// handshake phase are included; sessions registered later are not.
    pub fn recipient_ids(&self, exclude: Option<u64>) -> Vec<u64> {
        self.sessions.keys().copied().filter(|&id| Some(id) != exclude).collect()
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sessions that completed the handshake.
    pub fn active_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_authenticated()).count()
    }
}
