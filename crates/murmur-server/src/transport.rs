//! TCP transport with length-prefixed framing.
//!
//! Owns the listener and per-connection I/O tasks and turns everything that
//! happens on the sockets into [`TransportEvent`]s on a single channel. The
//! dispatch loop consumes that channel one event at a time, so protocol logic
//! never runs concurrently.
//!
//! # Tasks
//!
//! - one accept task, assigning connection ids 1, 2, 3, ...
//! - per connection, a read task decoding frames into `Data` events and
//!   emitting exactly one `Disconnected` when the stream ends
//! - per connection, a write task draining that peer's outbound queue
//!
//! Events for one connection are ordered: `Connected` first, then its `Data`
//! in arrival order, then `Disconnected`.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use bytes::{Bytes, BytesMut};
use murmur_proto::FrameCodec;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{mpsc, watch},
};

use crate::{broadcast::Outbox, error::ServerError, server_error::ExecutorError};

/// Consecutive accept failures tolerated before the listener gives up.
const MAX_ACCEPT_FAILURES: u32 = 10;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Something that happened on the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A connection was accepted
    Connected {
        /// Id assigned to the connection, never reused
        session_id: u64,
        /// Outbound handle for the connection
        peer: PeerHandle,
    },

    /// A complete payload was received
    Data {
        /// Connection that sent it
        session_id: u64,
        /// Payload with framing stripped
        payload: Bytes,
    },

    /// A connection ended
    Disconnected {
        /// Connection that ended
        session_id: u64,
        /// Why it ended
        reason: String,
    },

    /// The listener stopped accepting after repeated failures
    ListenerFailed {
        /// Last accept error
        reason: String,
    },
}

/// Outbound side of one connection.
///
/// Lines are framed here and queued to the connection's write task. Dropping
/// the handle closes the connection once queued data is flushed.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    session_id: u64,
    tx: mpsc::UnboundedSender<Bytes>,
    codec: FrameCodec,
}

impl PeerHandle {
    /// Frame `line` and queue it for sending.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::SendFailed` if the line exceeds the maximum message
    ///   size or the connection's write task is gone.
    pub fn send_line(&self, line: &str) -> Result<(), ExecutorError> {
        let frame = self.codec.encode_to_bytes(line.as_bytes()).map_err(|e| {
            ExecutorError::SendFailed { session_id: self.session_id, reason: e.to_string() }
        })?;

        self.tx.send(frame).map_err(|_| ExecutorError::SendFailed {
            session_id: self.session_id,
            reason: "connection closed".to_string(),
        })
    }

    /// Connection id.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Handle with no socket behind it; framed lines land in the receiver.
    #[cfg(test)]
    pub(crate) fn detached(
        session_id: u64,
        max_message_size: usize,
    ) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { session_id, tx, codec: FrameCodec::new(max_message_size) }, rx)
    }
}

/// Outbound handles of every live connection.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<u64, PeerHandle>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly connected peer.
    pub fn insert(&mut self, peer: PeerHandle) {
        self.peers.insert(peer.session_id, peer);
    }

    /// Stop tracking a peer. Its connection closes once the queue drains.
    pub fn remove(&mut self, session_id: u64) -> Option<PeerHandle> {
        self.peers.remove(&session_id)
    }

    /// Drop every handle.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are tracked.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Outbox for PeerTable {
    fn send(&mut self, session_id: u64, line: &str) -> Result<(), ExecutorError> {
        match self.peers.get(&session_id) {
            Some(peer) => peer.send_line(line),
            None => Err(ExecutorError::SendFailed {
                session_id,
                reason: "no connection".to_string(),
            }),
        }
    }
}

/// TCP listener plus the event channel fed by its I/O tasks.
#[derive(Debug)]
pub struct TcpTransport {
    local_addr: SocketAddr,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    shutdown: watch::Sender<bool>,
}

impl TcpTransport {
    /// Bind a listener and start accepting connections.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if `address` is not a socket address
    /// - `ServerError::Transport` if the listener cannot be bound
    pub async fn bind(address: &str, max_message_size: usize) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        let local_addr = listener.local_addr()?;

        let (events_tx, events) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let codec = FrameCodec::new(max_message_size);
        tokio::spawn(accept_loop(listener, codec, events_tx, shutdown_rx));

        tracing::info!("TCP transport bound to {}", local_addr);

        Ok(Self { local_addr, events, shutdown })
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the listener and every connection task are gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Next event if one is ready, without waiting.
    pub fn try_next_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    /// Stop accepting and stop reading from every connection.
    ///
    /// Idempotent. Outbound queues still drain until their handles drop.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!("TCP transport on {} stopped", self.local_addr);
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    codec: FrameCodec,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next_id: u64 = 1;
    let mut failures = 0;

    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer_addr)) => {
                failures = 0;

                let session_id = next_id;
                next_id += 1;

                tracing::debug!(session_id, %peer_addr, "accepted connection");

                if events.is_closed() {
                    return;
                }
                spawn_connection(session_id, stream, codec, &events, shutdown.clone());
            },
            Err(e) => {
                failures += 1;
                tracing::warn!(failures, "accept failed: {}", e);

                if failures >= MAX_ACCEPT_FAILURES {
                    let _ = events.send(TransportEvent::ListenerFailed { reason: e.to_string() });
                    return;
                }

                tokio::time::sleep(ACCEPT_BACKOFF).await;
            },
        }
    }
}

fn spawn_connection(
    session_id: u64,
    stream: TcpStream,
    codec: FrameCodec,
    events: &mpsc::UnboundedSender<TransportEvent>,
    shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(session_id, "failed to set TCP_NODELAY: {}", e);
    }

    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(write_loop(session_id, writer, rx));

    // Connected is queued before the read task exists, so it precedes any Data
    let peer = PeerHandle { session_id, tx, codec };
    if events.send(TransportEvent::Connected { session_id, peer }).is_err() {
        return;
    }

    tokio::spawn(read_loop(session_id, reader, codec, events.clone(), shutdown));
}

async fn read_loop(
    session_id: u64,
    mut reader: OwnedReadHalf,
    codec: FrameCodec,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = BytesMut::with_capacity(4096);

    let reason = loop {
        match codec.decode(&mut buf) {
            Ok(Some(payload)) => {
                if events.send(TransportEvent::Data { session_id, payload }).is_err() {
                    return;
                }
                continue;
            },
            Ok(None) => {},
            Err(e) => break e.to_string(),
        }

        let read = tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            read = reader.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => match codec.decode_eof(&mut buf) {
                Ok(Some(payload)) => {
                    let _ = events.send(TransportEvent::Data { session_id, payload });
                    break "connection closed by peer".to_string();
                },
                Ok(None) => break "connection closed by peer".to_string(),
                Err(e) => break e.to_string(),
            },
            Ok(_) => {},
            Err(e) => break e.to_string(),
        }
    };

    tracing::debug!(session_id, "read side finished: {}", reason);
    let _ = events.send(TransportEvent::Disconnected { session_id, reason });
}

async fn write_loop(
    session_id: u64,
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            tracing::debug!(session_id, "write failed: {}", e);
            return;
        }
    }

    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_frame(stream: &mut TcpStream, payload: &[u8]) {
        stream.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
        stream.write_all(payload).await.unwrap();
    }

    async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
        let len = stream.read_u32().await.unwrap() as usize;
        let mut payload = vec![0; len];
        stream.read_exact(&mut payload).await.unwrap();
        payload
    }

    async fn connected(transport: &mut TcpTransport) -> PeerHandle {
        match transport.next_event().await.unwrap() {
            TransportEvent::Connected { peer, .. } => peer,
            other => panic!("expected Connected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn assigns_increasing_ids_and_delivers_frames_in_order() {
        let mut transport = TcpTransport::bind("127.0.0.1:0", 1024).await.unwrap();
        let addr = transport.local_addr();

        let mut first = TcpStream::connect(addr).await.unwrap();
        assert_eq!(connected(&mut transport).await.session_id(), 1);
        let _second = TcpStream::connect(addr).await.unwrap();
        assert_eq!(connected(&mut transport).await.session_id(), 2);

        write_frame(&mut first, b"one").await;
        write_frame(&mut first, b"two").await;

        for expected in [&b"one"[..], b"two"] {
            match transport.next_event().await.unwrap() {
                TransportEvent::Data { session_id, payload } => {
                    assert_eq!(session_id, 1);
                    assert_eq!(&payload[..], expected);
                },
                other => panic!("expected Data, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn peer_handle_frames_outbound_lines() {
        let mut transport = TcpTransport::bind("127.0.0.1:0", 1024).await.unwrap();
        let mut client = TcpStream::connect(transport.local_addr()).await.unwrap();
        let peer = connected(&mut transport).await;

        peer.send_line("* 'Alice' entered the chat").unwrap();

        assert_eq!(read_frame(&mut client).await, b"* 'Alice' entered the chat");
    }

    #[tokio::test]
    async fn oversized_outbound_line_is_refused() {
        let mut transport = TcpTransport::bind("127.0.0.1:0", 4).await.unwrap();
        let _client = TcpStream::connect(transport.local_addr()).await.unwrap();
        let peer = connected(&mut transport).await;

        assert!(matches!(
            peer.send_line("too long"),
            Err(ExecutorError::SendFailed { session_id: 1, .. })
        ));
    }

    #[tokio::test]
    async fn oversized_inbound_frame_disconnects() {
        let mut transport = TcpTransport::bind("127.0.0.1:0", 8).await.unwrap();
        let mut client = TcpStream::connect(transport.local_addr()).await.unwrap();
        let _peer = connected(&mut transport).await;

        client.write_all(&1000u32.to_be_bytes()).await.unwrap();

        match transport.next_event().await.unwrap() {
            TransportEvent::Disconnected { session_id, reason } => {
                assert_eq!(session_id, 1);
                assert!(reason.contains("too large"), "{reason}");
            },
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn peer_close_emits_one_disconnect() {
        let mut transport = TcpTransport::bind("127.0.0.1:0", 1024).await.unwrap();
        let client = TcpStream::connect(transport.local_addr()).await.unwrap();
        let _peer = connected(&mut transport).await;

        drop(client);

        assert!(matches!(
            transport.next_event().await,
            Some(TransportEvent::Disconnected { session_id: 1, .. })
        ));
        assert!(transport.try_next_event().is_none());
    }

    #[tokio::test]
    async fn peer_table_reports_unknown_sessions() {
        let mut table = PeerTable::new();

        assert!(table.is_empty());
        assert_eq!(
            table.send(7, "hi"),
            Err(ExecutorError::SendFailed { session_id: 7, reason: "no connection".to_string() })
        );
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_ends_event_stream() {
        let mut transport = TcpTransport::bind("127.0.0.1:0", 1024).await.unwrap();

        transport.stop();
        transport.stop();

        assert!(transport.next_event().await.is_none());
    }
}
