//! Murmur chat server.
//!
//! A single-room chat server: clients connect over TCP, identify themselves
//! with a handshake, and every chat line is broadcast to all connected
//! clients and appended to a durable event log. New clients are shown the
//! most recent history first.
//!
//! # Architecture
//!
//! The protocol logic is sans-IO. [`ServerDriver`] turns transport events
//! into [`ServerAction`]s without touching a socket, and [`Executor`] carries
//! those actions out against the [`TcpTransport`] and the [`Storage`]
//! backend. [`Server`] is the dispatch loop gluing the two together: it takes
//! events off the transport one at a time, so the registry and the log are
//! only ever touched from one place.
//!
//! # Components
//!
//! - [`ServerDriver`]: action-based orchestrator (pure logic, no I/O)
//! - [`SessionRegistry`]: live sessions by connection id
//! - [`Executor`]: runs actions; sends, appends with retry, logs
//! - [`TcpTransport`]: length-prefixed TCP framing on tokio tasks
//! - [`storage`]: event log trait with in-memory and Redb backends
//! - [`config`]: `server.cfg` loading
//! - [`logging`]: console and file sinks

#![forbid(unsafe_code)]

pub mod broadcast;
pub mod config;
mod driver;
mod error;
mod executor;
pub mod logging;
mod registry;
mod server_error;
pub mod storage;
mod transport;

use std::net::SocketAddr;

pub use broadcast::Outbox;
pub use config::{ChatConfig, ConfigError, ConfigFile};
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::{ExitStatus, ServerError, StartupError};
pub use executor::Executor;
pub use registry::SessionRegistry;
pub use server_error::{DriverError, ExecutorError, RegistryError};
pub use storage::{ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError};
pub use transport::{PeerHandle, PeerTable, TcpTransport, TransportEvent};

/// Server configuration for the production runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:7777")
    pub bind_address: String,
    /// Largest payload accepted or sent, in bytes
    pub max_message_size: usize,
    /// Max transport events processed per poll
    pub event_budget: usize,
    /// Extra attempts for a failed append
    pub append_retries: u32,
    /// Driver configuration (replay window)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7777".to_string(),
            max_message_size: 16 * 1024,
            event_budget: 100,
            append_retries: 2,
            driver: DriverConfig::default(),
        }
    }
}

/// Why [`Server::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stopped {
    /// The shutdown future completed
    Manual,
    /// The transport has no more events
    TransportClosed,
}

/// Production Murmur server.
///
/// Wraps `ServerDriver` with the TCP transport and an action executor.
pub struct Server<S: Storage> {
    /// The action-based server driver
    driver: ServerDriver<S>,
    /// Listener and connection tasks
    transport: TcpTransport,
    /// Outbound handles of live connections
    peers: PeerTable,
    /// Action executor
    executor: Executor,
    /// Max events per poll
    event_budget: usize,
}

impl<S: Storage> Server<S> {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` for an unparsable bind address
    /// - `ServerError::Transport` if the listener cannot be bound
    pub async fn bind(storage: S, config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let transport = TcpTransport::bind(&config.bind_address, config.max_message_size).await?;
        let driver = ServerDriver::new(storage, config.driver);

        Ok(Self {
            driver,
            transport,
            peers: PeerTable::new(),
            executor: Executor::new(config.append_retries),
            event_budget: config.event_budget.max(1),
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// The driver (registry, storage).
    pub fn driver(&self) -> &ServerDriver<S> {
        &self.driver
    }

    /// Process up to `budget` ready transport events without waiting.
    ///
    /// Returns how many events were processed; zero when none were ready.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the listener has failed
    pub fn poll(&mut self, budget: usize) -> Result<usize, ServerError> {
        let mut processed = 0;

        while processed < budget {
            let Some(event) = self.transport.try_next_event() else {
                break;
            };
            self.dispatch(event)?;
            processed += 1;
        }

        Ok(processed)
    }

    /// Run until `shutdown` completes or the transport closes.
    ///
    /// Waits for one event at a time, then drains whatever else is ready up
    /// to the event budget, checking `shutdown` between batches. The listener
    /// is stopped before returning.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the listener gives up accepting
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<Stopped, ServerError> {
        tracing::info!("server listening on {}", self.local_addr());

        tokio::pin!(shutdown);

        let result = loop {
            let event = tokio::select! {
                biased;
                () = &mut shutdown => break Ok(Stopped::Manual),
                event = self.transport.next_event() => event,
            };

            let Some(event) = event else {
                break Ok(Stopped::TransportClosed);
            };

            let batch = self
                .dispatch(event)
                .and_then(|()| self.poll(self.event_budget.saturating_sub(1)));
            if let Err(e) = batch {
                break Err(e);
            }
        };

        self.shutdown();
        result
    }

    /// Stop the listener and drop every connection.
    ///
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.transport.stop();
        if !self.peers.is_empty() {
            tracing::info!(connections = self.peers.len(), "closing connections");
            self.peers.clear();
        }
    }

    /// Feed one transport event through the driver and execute the result.
    fn dispatch(&mut self, event: TransportEvent) -> Result<(), ServerError> {
        // A peer handle joins the table only after the driver registers it
        let mut accepted = None;
        let event = match event {
            TransportEvent::Connected { session_id, peer } => {
                accepted = Some(peer);
                ServerEvent::ConnectionAccepted { session_id }
            },
            TransportEvent::Data { session_id, payload } => {
                ServerEvent::PayloadReceived { session_id, payload }
            },
            TransportEvent::Disconnected { session_id, reason } => {
                self.peers.remove(session_id);
                ServerEvent::ConnectionClosed { session_id, reason }
            },
            TransportEvent::ListenerFailed { reason } => {
                return Err(ServerError::Transport(format!("listener failed: {reason}")));
            },
        };

        match self.driver.process_event(event) {
            Ok(actions) => {
                if let Some(peer) = accepted {
                    self.peers.insert(peer);
                }
                self.executor.execute(self.driver.storage(), &mut self.peers, actions);
            },
            Err(e @ DriverError::Session { .. }) => tracing::debug!("{}", e),
            Err(e) => tracing::warn!("{}", e),
        }

        Ok(())
    }
}

impl<S: Storage> std::fmt::Debug for Server<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr())
            .field("driver", &self.driver)
            .field("connections", &self.peers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };

    use super::*;

    fn config() -> ServerRuntimeConfig {
        ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() }
    }

    async fn next(server: &mut Server<MemoryStorage>) {
        let event = server.transport.next_event().await.unwrap();
        server.dispatch(event).unwrap();
    }

    #[tokio::test]
    async fn duplicate_connect_keeps_live_peer_handle() {
        let mut server = Server::bind(MemoryStorage::new(), config()).await.unwrap();
        let mut client = TcpStream::connect(server.local_addr()).await.unwrap();
        next(&mut server).await;
        assert_eq!(server.peers.len(), 1);

        // Same id again; the driver rejects it and the table must not change
        let (duplicate, mut duplicate_rx) = PeerHandle::detached(1, 1024);
        server
            .dispatch(TransportEvent::Connected { session_id: 1, peer: duplicate })
            .unwrap();
        assert_eq!(server.peers.len(), 1);
        assert_eq!(server.driver().session_count(), 1);

        client.write_all(&11u32.to_be_bytes()).await.unwrap();
        client.write_all(b"FF0000Alice").await.unwrap();
        next(&mut server).await;

        let len = client.read_u32().await.unwrap() as usize;
        let mut line = vec![0; len];
        client.read_exact(&mut line).await.unwrap();
        assert_eq!(line, b"* 'Alice' entered the chat");
        assert!(duplicate_rx.try_recv().is_err());
    }
}
