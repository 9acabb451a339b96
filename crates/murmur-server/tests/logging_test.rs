//! Logging initialization.
//!
//! Lives in its own test binary: the global subscriber can only be installed
//! once per process.

use murmur_server::logging::{self, LogConfig, LogInitError};
use tempfile::tempdir;
use tracing_subscriber::filter::LevelFilter;

#[test]
fn test_file_sink_respects_its_own_level() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server.log");

    let config = LogConfig {
        console: LevelFilter::OFF,
        file: LevelFilter::WARN,
        file_path: Some(path.clone()),
    };

    let guard = logging::init(&config).unwrap();
    assert!(guard.is_some());

    tracing::info!("below file threshold");
    tracing::warn!("disk almost full");

    // Flush the background writer
    drop(guard);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("disk almost full"), "{contents}");
    assert!(!contents.contains("below file threshold"), "{contents}");
    assert!(!contents.contains('\u{1b}'), "file output must not contain ANSI escapes");

    // A second subscriber cannot be installed
    let again = logging::init(&LogConfig::default());
    assert!(matches!(again, Err(LogInitError::Configure(_))));
}

#[test]
fn test_unwritable_log_file_is_reported() {
    let dir = tempdir().unwrap();

    let config = LogConfig {
        console: LevelFilter::OFF,
        file: LevelFilter::TRACE,
        // A directory cannot be opened as a log file
        file_path: Some(dir.path().to_path_buf()),
    };

    assert!(matches!(logging::init(&config), Err(LogInitError::Io { .. })));
}
