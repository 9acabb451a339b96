//! Server error types.

use std::{fmt, process::ExitCode};

use thiserror::Error;

use crate::{config::ConfigError, logging::LogInitError, storage::StorageError};

/// Errors that stop the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, etc.).
    ///
    /// Fatal: prevents server startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (bind failure, listener gave up, etc.).
    Transport(String),

    /// Internal error (server task panicked, etc.).
    ///
    /// Should never happen in correct implementation. Indicates a bug.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failures before the server loop starts, in startup order.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Configuration file missing, unreadable, or invalid
    #[error("cannot load configuration: {0}")]
    Config(#[from] ConfigError),

    /// Log sink could not be set up
    #[error("cannot initialize logging: {0}")]
    Logging(#[from] LogInitError),

    /// Event log could not be opened
    #[error("cannot open event log: {0}")]
    Storage(#[from] StorageError),

    /// Listener could not be started
    #[error("cannot start network: {0}")]
    Listener(#[source] ServerError),
}

impl StartupError {
    /// Process exit status for this failure.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Config(_) | Self::Logging(_) => ExitStatus::CannotLoadConfig,
            Self::Storage(_) => ExitStatus::CannotOpenStore,
            Self::Listener(_) => ExitStatus::CannotStartNetwork,
        }
    }
}

/// Process exit statuses, one per termination cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    /// Configuration could not be loaded
    CannotLoadConfig = 1,
    /// Listener could not be started
    CannotStartNetwork = 2,
    /// Event log could not be opened
    CannotOpenStore = 3,
    /// Operator requested shutdown
    ManualExit = 4,
    /// Server loop ended because the transport closed
    ProgramFinished = 5,
    /// Unexpected fault while running
    RuntimeError = 100,
}

impl ExitStatus {
    /// Numeric status code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
