//! Logging setup.
//!
//! Two sinks with independent levels: the console (stderr) and an optional
//! append-only log file. `RUST_LOG`, when set, overrides the console level.
//! The file is written from a background thread; keep the returned
//! [`WorkerGuard`] alive until exit so buffered lines are flushed.

use std::{fs::OpenOptions, path::PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Dependencies that are far too chatty below info.
const NOISY_TARGETS: &[&str] = &["redb", "mio", "tokio"];

/// Log sinks and their levels.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Console threshold
    pub console: LevelFilter,
    /// File threshold
    pub file: LevelFilter,
    /// Log file; `None` disables the file sink
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { console: LevelFilter::INFO, file: LevelFilter::OFF, file_path: None }
    }
}

/// Errors from [`init`].
#[derive(Error, Debug)]
pub enum LogInitError {
    /// Log file could not be opened for appending
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        /// Log file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Subscriber could not be installed (already initialized, bad directive)
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

/// Install the global subscriber.
///
/// Returns the file writer guard when a file sink is configured.
///
/// # Errors
///
/// - `LogInitError::Io` if the log file cannot be opened
/// - `LogInitError::Configure` if a subscriber is already installed
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, LogInitError> {
    let console =
        fmt::layer().with_writer(std::io::stderr).with_filter(console_filter(config.console)?);

    let (file, guard) = match &config.file_path {
        Some(path) => {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogInitError::Io { path: path.clone(), source })?;
            let (writer, guard) = tracing_appender::non_blocking(log_file);

            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_filter(config.file);
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LogInitError::Configure(e.to_string()))?;

    Ok(guard)
}

fn console_filter(level: LevelFilter) -> Result<EnvFilter, LogInitError> {
    let mut filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() && level > LevelFilter::INFO {
        for target in NOISY_TARGETS {
            let directive = format!("{target}=info")
                .parse()
                .map_err(|e| LogInitError::Configure(format!("{e}")))?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}
