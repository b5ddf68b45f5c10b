//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use pingload_protocol::WireMode;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the TCP listener to.
    pub bind_addr: SocketAddr,

    /// Wire protocol spoken on accepted connections.
    pub wire: WireMode,

    /// Maximum concurrent connections; accepts beyond this wait for a slot.
    pub max_connections: usize,

    /// Per-read/write idle timeout. The reference behavior is no timeout,
    /// so the default is `None`.
    pub idle_timeout: Option<Duration>,

    /// Where to write the per-request CSV log; disabled when `None`.
    pub request_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().expect("valid literal addr"),
            wire: WireMode::Framed,
            max_connections: 1024,
            idle_timeout: None,
            request_log: None,
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration with the given bind address.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builder: set the wire mode.
    pub fn with_wire(mut self, wire: WireMode) -> Self {
        self.wire = wire;
        self
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder: set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Builder: set the request log path.
    pub fn with_request_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.request_log = Some(path.into());
        self
    }
}
