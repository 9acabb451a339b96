//! Action executor.
//!
//! Runs driver actions against real side-effect sinks: lines go to an
//! [`Outbox`], events go to the [`Storage`] backend, log actions go to
//! `tracing`. Actions are executed strictly in order, so a broadcast is
//! handed to the transport before the event behind it is appended.

use murmur_core::ChatEvent;

use crate::{
    broadcast::{self, Outbox},
    driver::{LogLevel, ServerAction},
    server_error::ExecutorError,
    storage::Storage,
};

/// Executes [`ServerAction`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    /// Extra append attempts after a transient storage failure
    append_retries: u32,
}

impl Default for Executor {
    fn default() -> Self {
        Self { append_retries: 2 }
    }
}

impl Executor {
    /// Create an executor that retries failed appends `append_retries` times.
    pub fn new(append_retries: u32) -> Self {
        Self { append_retries }
    }

    /// Execute `actions` in order.
    ///
    /// Never stops early: a failed send or append is logged and reported in
    /// the returned vec, and the remaining actions still run.
    pub fn execute<S, O>(
        &self,
        storage: &S,
        outbox: &mut O,
        actions: Vec<ServerAction>,
    ) -> Vec<ExecutorError>
    where
        S: Storage,
        O: Outbox + ?Sized,
    {
        let mut errors = Vec::new();

        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, line } => {
                    if let Err(e) = outbox.send(session_id, &line) {
                        errors.push(e);
                    }
                },

                ServerAction::Broadcast { line, recipients } => {
                    errors.extend(broadcast::deliver(outbox, &line, &recipients));
                },

                ServerAction::PersistEvent { event } => {
                    if let Err(e) = self.persist(storage, &event) {
                        errors.push(e);
                    }
                },

                ServerAction::Log { level, message } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }

        for error in &errors {
            match error {
                ExecutorError::SendFailed { .. } => tracing::warn!("{}", error),
                ExecutorError::StorageFailed { .. } => tracing::error!("{}", error),
            }
        }

        errors
    }

    /// Append with bounded retries on transient failures.
    fn persist<S: Storage>(&self, storage: &S, event: &ChatEvent) -> Result<u64, ExecutorError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match storage.append(event) {
                Ok(seq) => {
                    tracing::trace!(seq, kind = ?event.kind, user = %event.username, "event appended");
                    return Ok(seq);
                },
                Err(e) if e.is_transient() && attempts <= self.append_retries => {
                    tracing::debug!(attempt = attempts, error = %e, "append failed, retrying");
                },
                Err(source) => return Err(ExecutorError::StorageFailed { attempts, source }),
            }
        }
    }
}
