//! Murmur server binary.
//!
//! # Usage
//!
//! ```bash
//! # Read ./server.cfg
//! murmur-server
//!
//! # Explicit config file
//! murmur-server --config /etc/murmur/server.cfg
//! ```
//!
//! Exit status tells why the process ended: 1 configuration, 2 network,
//! 3 event log, 4 manual shutdown (Ctrl-C), 5 transport closed, 100 runtime
//! fault.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use murmur_server::{
    ChatConfig, ExitStatus, RedbStorage, Server, ServerError, StartupError, Stopped, logging,
};

/// Murmur chat server
#[derive(Parser, Debug)]
#[command(name = "murmur-server")]
#[command(about = "Single-room chat server with durable history")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "server.cfg")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match ChatConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => return fail(&StartupError::from(e)),
    };

    // Flushes the log file on drop, so it must outlive the runtime
    let _log_guard = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(e) => return fail(&StartupError::from(e)),
    };

    tracing::info!("Murmur server starting with {}", args.config.display());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("cannot start async runtime: {}", e);
            return ExitStatus::RuntimeError.into();
        },
    };

    runtime.block_on(serve(config)).into()
}

async fn serve(config: ChatConfig) -> ExitStatus {
    let storage = match RedbStorage::open(&config.database_file) {
        Ok(storage) => storage,
        Err(e) => return startup_failed(&StartupError::from(e)),
    };
    tracing::info!("event log opened at {}", config.database_file.display());

    let server = match Server::bind(storage, config.runtime()).await {
        Ok(server) => server,
        Err(e) => return startup_failed(&StartupError::Listener(e)),
    };

    // Spawned so a panic in the dispatch loop surfaces as a JoinError
    let outcome = tokio::spawn(server.run(shutdown_signal())).await;

    match outcome {
        Ok(Ok(Stopped::Manual)) => {
            tracing::info!("shutdown requested, exiting");
            ExitStatus::ManualExit
        },
        Ok(Ok(Stopped::TransportClosed)) => {
            tracing::info!("transport closed, exiting");
            ExitStatus::ProgramFinished
        },
        Ok(Err(e)) => {
            tracing::error!("server stopped: {}", e);
            ExitStatus::RuntimeError
        },
        Err(e) => {
            tracing::error!("{}", ServerError::Internal(format!("server task failed: {e}")));
            ExitStatus::RuntimeError
        },
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn startup_failed(error: &StartupError) -> ExitStatus {
    tracing::error!("{}", error);
    error.exit_status()
}

/// Report a failure that happened before logging was available.
#[allow(clippy::print_stderr)]
fn fail(error: &StartupError) -> ExitCode {
    eprintln!("murmur-server: {error}");
    error.exit_status().into()
}
