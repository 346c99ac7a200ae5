//! Console configuration types.
//!
//! [`ConsoleConfig`] is the single source of truth for all runtime settings
//! of the console server.  It is built once at startup, from the TOML file
//! and command-line overrides in the binary, or from defaults in tests.
//!
//! # Design rationale
//!
//! The domain layer never reads files or environment variables.  The
//! infrastructure layer populates this struct, which keeps the server easy
//! to start on an ephemeral port inside tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default TCP port of the diagnostic console.
pub const DEFAULT_PORT: u16 = 24900;

/// Default welcome line sent to every operator on connect.
pub const DEFAULT_GREETING: &str = "ICD diagnostic console ready; type 'help' for a list of objects";

/// All runtime configuration for the console server.
///
/// # Example
///
/// ```rust
/// use icd_console::domain::ConsoleConfig;
///
/// let cfg = ConsoleConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 24900);
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Address and port the listener binds to.
    ///
    /// Port `0` asks the OS for an ephemeral port; read the real one back
    /// from [`ConsoleHandle::local_addr`](crate::ConsoleHandle::local_addr).
    pub bind_addr: SocketAddr,

    /// Line sent to each client immediately after it is attached.
    pub greeting: String,

    /// Longest partial line (in bytes) buffered for one client before the
    /// line is discarded.
    pub max_line_len: usize,

    /// Upper bound on how long to wait for a client's outstanding writes
    /// before its socket is closed.
    pub send_drain_timeout: Duration,

    /// Capacity of the shared command queue.  Readers wait when it is full.
    pub queue_capacity: usize,

    /// Lines that may wait in one client's outbound FIFO.  A send that
    /// finds it full disconnects the client.
    pub outbound_capacity: usize,
}

impl Default for ConsoleConfig {
    /// | Field              | Default             |
    /// |--------------------|---------------------|
    /// | bind_addr          | `127.0.0.1:24900`   |
    /// | greeting           | [`DEFAULT_GREETING`]|
    /// | max_line_len       | 4096 bytes          |
    /// | send_drain_timeout | 2 seconds           |
    /// | queue_capacity     | 256 events          |
    /// | outbound_capacity  | 1024 lines          |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            greeting: DEFAULT_GREETING.to_string(),
            max_line_len: 4096,
            send_drain_timeout: Duration::from_secs(2),
            queue_capacity: 256,
            outbound_capacity: 1024,
        }
    }
}

impl ConsoleConfig {
    /// Same as the default but bound to an OS-assigned port on localhost.
    pub fn ephemeral() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = ConsoleConfig::default();

        assert_eq!(cfg.bind_addr.port(), DEFAULT_PORT);
        assert!(cfg.bind_addr.ip().is_loopback());
        assert_eq!(cfg.greeting, DEFAULT_GREETING);
        assert_eq!(cfg.max_line_len, 4096);
        assert_eq!(cfg.send_drain_timeout, Duration::from_secs(2));
        assert_eq!(cfg.queue_capacity, 256);
        assert_eq!(cfg.outbound_capacity, 1024);
    }

    #[test]
    fn test_ephemeral_uses_port_zero() {
        let cfg = ConsoleConfig::ephemeral();
        assert_eq!(cfg.bind_addr.port(), 0);
        assert_eq!(cfg.max_line_len, ConsoleConfig::default().max_line_len);
    }
}
