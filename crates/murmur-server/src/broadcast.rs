//! Broadcast fan-out.
//!
//! A broadcast is resolved in two steps. The driver takes a recipient
//! snapshot from the registry when the action is produced, and the executor
//! delivers one copy of the line to each id in that snapshot through an
//! [`Outbox`]. Failures are collected per recipient; one closed connection
//! never stops delivery to the rest.

use crate::{registry::SessionRegistry, server_error::ExecutorError};

/// Sink for outbound lines, keyed by session id.
///
/// Implemented by the TCP peer table in production and by recording fakes in
/// tests.
pub trait Outbox {
    /// Queue `line` for delivery to `session_id`.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::SendFailed` if the session has no live connection or
    ///   the line cannot be framed.
    fn send(&mut self, session_id: u64, line: &str) -> Result<(), ExecutorError>;
}

/// Recipient snapshot for a broadcast.
///
/// Every registered session except `exclude`, ascending by id, whether or not
/// it has completed the handshake.
pub fn recipients(registry: &SessionRegistry, exclude: Option<u64>) -> Vec<u64> {
    registry.recipient_ids(exclude)
}

/// Send `line` to each recipient exactly once.
///
/// Returns the failed sends; an empty vec means every recipient got the line.
pub fn deliver<O: Outbox + ?Sized>(
    outbox: &mut O,
    line: &str,
    recipients: &[u64],
) -> Vec<ExecutorError> {
    recipients.iter().filter_map(|&session_id| outbox.send(session_id, line).err()).collect()
}
