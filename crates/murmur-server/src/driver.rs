//! Server driver.
//!
//! Ties together the per-session protocol state machines, the session
//! registry, and the event log. The driver performs no network I/O: it turns
//! each [`ServerEvent`] into a list of [`ServerAction`]s for the runtime to
//! execute, in order. Reads from the event log (history replay) happen inline
//! so the replayed window is exactly the log state at handshake time.

use bytes::Bytes;
use murmur_core::{SessionAction, SessionState};

use crate::{
    broadcast,
    registry::SessionRegistry,
    server_error::{DriverError, RegistryError},
    storage::Storage,
};

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Number of past events replayed to a session after its handshake
    pub replay_window: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { replay_window: 20 }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the transport, one per connection lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the transport
        session_id: u64,
    },

    /// A complete payload arrived from a connection
    PayloadReceived {
        /// Connection that sent the payload
        session_id: u64,
        /// Raw payload bytes, framing already stripped
        payload: Bytes,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },
}

/// Actions that the server driver produces.
///
/// Executed by [`crate::executor::Executor`] strictly in the order returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Send a line to a single session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Rendered line
        line: String,
    },

    /// Send a line to each session in a snapshot taken by the driver
    Broadcast {
        /// Rendered line
        line: String,
        /// Recipient snapshot, ascending by id
        recipients: Vec<u64>,
    },

    /// Append an event to the durable log
    PersistEvent {
        /// Event to append
        event: murmur_core::ChatEvent,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based server driver.
///
/// Owns every piece of server state; multiple drivers can coexist in one
/// process without sharing anything.
pub struct ServerDriver<S: Storage> {
    /// Live sessions
    registry: SessionRegistry,
    /// Event log
    storage: S,
    /// Driver configuration
    config: DriverConfig,
}

impl<S: Storage> ServerDriver<S> {
    /// Create a new server driver.
    pub fn new(storage: S, config: DriverConfig) -> Self {
        Self { registry: SessionRegistry::new(), storage, config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    ///
    /// # Errors
    ///
    /// - `DriverError::Registry` for an accept on a live id, or data/close on
    ///   an unknown id
    /// - `DriverError::Session` when the session drops a payload (not UTF-8,
    ///   handshake too short)
    ///
    /// Every error leaves the driver state unchanged and produces no actions.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::PayloadReceived { session_id, payload } => {
                self.handle_payload_received(session_id, &payload)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                self.handle_connection_closed(session_id, &reason)
            },
        }
    }

    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
    ) -> Result<Vec<ServerAction>, DriverError> {
        self.registry.register(session_id)?;

        Ok(vec![ServerAction::Log {
            level: LogLevel::Debug,
            message: format!("connection {session_id} accepted"),
        }])
    }

    fn handle_payload_received(
        &mut self,
        session_id: u64,
        payload: &[u8],
    ) -> Result<Vec<ServerAction>, DriverError> {
        let session =
            self.registry.get_mut(session_id).ok_or(RegistryError::NotFound(session_id))?;

        let was_active = session.state() == SessionState::Active;
        let session_actions = session
            .handle_payload(payload)
            .map_err(|source| DriverError::Session { session_id, source })?;

        let mut actions = Vec::with_capacity(session_actions.len() + 1);

        if !was_active {
            let name = session.display_name().unwrap_or_default();
            let color = session.color_tag().unwrap_or_default();
            actions.push(ServerAction::Log {
                level: LogLevel::Info,
                message: format!("session {session_id} authenticated as '{name}' ({color})"),
            });
        }

        for action in session_actions {
            self.resolve(session_id, action, &mut actions);
        }

        Ok(actions)
    }

    fn handle_connection_closed(
        &mut self,
        session_id: u64,
        reason: &str,
    ) -> Result<Vec<ServerAction>, DriverError> {
        let session = self.registry.get(session_id).ok_or(RegistryError::NotFound(session_id))?;
        let session_actions = session.handle_disconnect();

        // Resolve before removal so the leave snapshot is taken while the
        // session is still registered; the session excludes itself.
        let mut actions = Vec::with_capacity(session_actions.len() + 1);
        for action in session_actions {
            self.resolve(session_id, action, &mut actions);
        }

        if let Some(session) = self.registry.unregister(session_id) {
            actions.push(ServerAction::Log {
                level: LogLevel::Info,
                message: match session.display_name() {
                    Some(name) => format!("session {session_id} ('{name}') closed: {reason}"),
                    None => format!("session {session_id} closed before handshake: {reason}"),
                },
            });
        }

        Ok(actions)
    }

    /// Convert a session action into server actions.
    fn resolve(&self, session_id: u64, action: SessionAction, out: &mut Vec<ServerAction>) {
        match action {
            SessionAction::ReplayHistory => match self.storage.read_last(self.config.replay_window)
            {
                Ok(events) => out.extend(events.iter().map(|event| ServerAction::SendToSession {
                    session_id,
                    line: event.to_line().render(),
                })),
                Err(e) => out.push(ServerAction::Log {
                    level: LogLevel::Error,
                    message: format!("history replay for session {session_id} failed: {e}"),
                }),
            },

            SessionAction::Broadcast { line, exclude } => out.push(ServerAction::Broadcast {
                line: line.render(),
                recipients: broadcast::recipients(&self.registry, exclude),
            }),

            SessionAction::Append(event) => out.push(ServerAction::PersistEvent { event }),
        }
    }

    /// Session registry (read-only).
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Number of live sessions, authenticated or not.
    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Event log backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<S: Storage> std::fmt::Debug for ServerDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("session_count", &self.registry.session_count())
            .field("active_count", &self.registry.active_count())
            .field("config", &self.config)
            .finish()
    }
}
