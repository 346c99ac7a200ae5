//! TOML configuration file for the console binary.
//!
//! Every key is optional; a missing file means "all defaults".
//!
//! ```toml
//! [console]
//! bind_address = "0.0.0.0"
//! port = 24900
//! greeting = "flight rig 3 console"
//! max_line_len = 4096
//! send_drain_timeout_ms = 2000
//! queue_capacity = 256
//! outbound_capacity = 1024
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the value of
//! `some_fn()` when the key is absent, so an older or partial file keeps
//! working as new settings are added.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{ConsoleConfig, DEFAULT_GREETING, DEFAULT_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsoleFileConfig {
    #[serde(default)]
    pub console: ConsoleSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[console]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleSection {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    #[serde(default = "default_send_drain_timeout_ms")]
    pub send_drain_timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

/// `[logging]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}
fn default_max_line_len() -> usize {
    4096
}
fn default_send_drain_timeout_ms() -> u64 {
    2000
}
fn default_queue_capacity() -> usize {
    256
}
fn default_outbound_capacity() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            greeting: default_greeting(),
            max_line_len: default_max_line_len(),
            send_drain_timeout_ms: default_send_drain_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ConsoleFileConfig {
    /// Converts the file representation into the runtime [`ConsoleConfig`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidBindAddress`] if `bind_address` is not an IP.
    pub fn into_console_config(self) -> Result<ConsoleConfig, ConfigError> {
        let section = self.console;
        let ip: IpAddr = section
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(section.bind_address.clone()))?;

        Ok(ConsoleConfig {
            bind_addr: SocketAddr::new(ip, section.port),
            greeting: section.greeting,
            max_line_len: section.max_line_len.max(1),
            send_drain_timeout: Duration::from_millis(section.send_drain_timeout_ms),
            queue_capacity: section.queue_capacity.max(1),
            outbound_capacity: section.outbound_capacity.max(1),
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ConsoleFileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConsoleFileConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ConsoleFileConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
