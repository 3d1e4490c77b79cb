//! Configuration for the relay and worker processes.

use std::net::SocketAddr;
use std::time::Duration;

use crate::framing::DEFAULT_MAX_FRAME_LEN;

/// Default TCP listen address for worker connections.
pub const DEFAULT_TCP_ADDR: &str = "0.0.0.0:9001";

/// Default HTTP listen address for the gateway.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

/// Default deadline for a command's response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between worker reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default maximum concurrent handler invocations per worker.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 64;

/// Relay process configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the TCP listener binds for worker connections.
    pub tcp_addr: SocketAddr,
    /// Address the HTTP gateway binds.
    pub http_addr: SocketAddr,
    /// How long a gateway call waits for the matching response.
    pub request_timeout: Duration,
    /// Maximum accepted frame body size.
    pub max_frame_len: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            tcp_addr: DEFAULT_TCP_ADDR.parse().expect("valid default address"),
            http_addr: DEFAULT_HTTP_ADDR.parse().expect("valid default address"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Relay address to connect to.
    pub relay_addr: String,
    /// Id announced in the hello frame.
    pub client_id: String,
    /// Delay before reconnecting after a lost connection.
    pub reconnect_delay: Duration,
    /// Maximum handler invocations running at once.
    pub max_concurrent_handlers: usize,
    /// Maximum accepted frame body size.
    pub max_frame_len: u32,
}

impl WorkerConfig {
    /// Configuration for a worker with the given id, relay on localhost.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            relay_addr: "127.0.0.1:9001".to_string(),
            client_id: client_id.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
