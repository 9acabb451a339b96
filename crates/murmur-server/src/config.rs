//! `server.cfg` loading.
//!
//! The file is a list of `Key = value` lines. Keys are case-insensitive and
//! may contain dots; anything that does not look like an assignment (blank
//! lines, comments, section headers) is skipped. A key may appear only once.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::{DriverConfig, ServerRuntimeConfig, logging::LogConfig};

#[allow(clippy::expect_used)]
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w\.]+)\s*=\s*(.+)$").expect("assignment pattern is valid")
});

/// Errors from loading `server.cfg`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Same key assigned twice
    #[error("duplicate key '{key}' on line {line}")]
    Duplicate {
        /// Lowercased key
        key: String,
        /// 1-based line of the second assignment
        line: usize,
    },

    /// Required key not present
    #[error("missing required key '{key}'")]
    Missing {
        /// Lowercased key
        key: &'static str,
    },

    /// Value present but unusable
    #[error("invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        /// Lowercased key
        key: &'static str,
        /// Raw value
        value: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Raw key/value pairs of a config file, keys lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    values: HashMap<String, String>,
}

impl ConfigFile {
    /// Parse config text.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Duplicate` if a key is assigned twice (compared
    ///   case-insensitively)
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            let Some(captures) = ASSIGNMENT.captures(line.trim_end()) else {
                continue;
            };

            let key = captures[1].to_lowercase();
            let value = captures[2].trim().to_string();

            if values.contains_key(&key) {
                return Err(ConfigError::Duplicate { key, line: index + 1 });
            }
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Duplicate` as for [`ConfigFile::parse`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }

    /// Value for `key`, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    fn required(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing { key })
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(value) => parse_value(key, value),
            None => Ok(default),
        }
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a log level: a number 0-6 or a level name.
///
/// 0 trace, 1 debug, 2 info, 3 warn, 4 success (shown as info), 5 error,
/// 6 no log.
fn parse_level(key: &'static str, value: &str) -> Result<LevelFilter, ConfigError> {
    let level = match value.to_lowercase().as_str() {
        "0" | "trace" => LevelFilter::TRACE,
        "1" | "debug" => LevelFilter::DEBUG,
        "2" | "info" | "4" | "success" => LevelFilter::INFO,
        "3" | "warn" | "warning" => LevelFilter::WARN,
        "5" | "error" => LevelFilter::ERROR,
        "6" | "off" | "no_log" | "none" => LevelFilter::OFF,
        _ => {
            return Err(ConfigError::Invalid {
                key,
                value: value.to_string(),
                reason: "expected 0-6 or a level name".to_string(),
            });
        },
    };
    Ok(level)
}

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Address to listen on
    pub bind_address: IpAddr,
    /// TCP port to listen on
    pub port: u16,
    /// Largest payload accepted or sent, in bytes
    pub max_message_size: usize,
    /// Log sinks and levels
    pub log: LogConfig,
    /// Event log database file
    pub database_file: PathBuf,
    /// Events replayed after a handshake
    pub replay_window: usize,
    /// Max transport events processed per poll
    pub event_budget: usize,
    /// Extra attempts for a failed append
    pub append_retries: u32,
}

impl ChatConfig {
    /// Load and validate `path`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]: unreadable file, duplicate key, missing required
    /// key, or unparsable value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file(&ConfigFile::load(path)?)
    }

    /// Validate parsed key/value pairs.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Missing` for `Database.File`, `Network.TCPListenPort`,
    ///   or `Network.MaxMessageSize`
    /// - `ConfigError::Invalid` for values that do not parse or are zero
    ///   where zero makes no sense
    pub fn from_file(file: &ConfigFile) -> Result<Self, ConfigError> {
        let database_file = PathBuf::from(file.required("database.file")?);
        let port = parse_value("network.tcplistenport", file.required("network.tcplistenport")?)?;
        let max_message_size: usize =
            parse_value("network.maxmessagesize", file.required("network.maxmessagesize")?)?;
        if max_message_size == 0 {
            return Err(ConfigError::Invalid {
                key: "network.maxmessagesize",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let event_budget = file.parsed("server.eventbudget", 100)?;
        if event_budget == 0 {
            return Err(ConfigError::Invalid {
                key: "server.eventbudget",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let log = LogConfig {
            console: match file.get("log.lvlconsole") {
                Some(value) => parse_level("log.lvlconsole", value)?,
                None => LevelFilter::TRACE,
            },
            file: match file.get("log.lvlfile") {
                Some(value) => parse_level("log.lvlfile", value)?,
                None => LevelFilter::TRACE,
            },
            file_path: file.get("log.file").filter(|p| !p.is_empty()).map(PathBuf::from),
        };

        Ok(Self {
            bind_address: file.parsed("network.bindaddress", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port,
            max_message_size,
            log,
            database_file,
            replay_window: file.parsed("lastmessagescount", 20)?,
            event_budget,
            append_retries: file.parsed("database.appendretries", 2)?,
        })
    }

    /// Runtime settings for [`crate::Server::bind`].
    pub fn runtime(&self) -> ServerRuntimeConfig {
        ServerRuntimeConfig {
            bind_address: SocketAddr::new(self.bind_address, self.port).to_string(),
            max_message_size: self.max_message_size,
            event_budget: self.event_budget,
            append_retries: self.append_retries,
            driver: DriverConfig { replay_window: self.replay_window },
        }
    }
}
