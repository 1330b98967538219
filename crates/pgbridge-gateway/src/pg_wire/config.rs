//! PostgreSQL wire protocol configuration
//!
//! All values can be overridden via environment variables for flexible deployment.

use super::protocol::constants::DEFAULT_MAX_MESSAGE_SIZE;
use tracing::info;

/// Version reported to clients in the `server_version` parameter
pub const DEFAULT_SERVER_VERSION: &str = "10.5";

/// PostgreSQL wire protocol configuration
/// All values can be overridden via environment variables
#[derive(Debug, Clone)]
pub struct PgWireConfig {
    /// TCP keepalive time in seconds (detects dead connections)
    pub tcp_keepalive_secs: u64,
    /// Largest frontend message accepted, in bytes
    pub max_message_size: usize,
    /// Reported as `server_version` after startup
    pub server_version: String,
}

impl Default for PgWireConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: std::env::var("PGBRIDGE_TCP_KEEPALIVE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            max_message_size: std::env::var("PGBRIDGE_MAX_MESSAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_MESSAGE_SIZE),
            server_version: std::env::var("PGBRIDGE_SERVER_VERSION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_VERSION.to_string()),
        }
    }
}

impl PgWireConfig {
    /// Log configuration on startup
    pub fn log_config(&self) {
        info!(
            "PgWire config: server_version={}, max_message_size={}KB, tcp_keepalive={}s",
            self.server_version,
            self.max_message_size / 1024,
            self.tcp_keepalive_secs
        );
    }
}
