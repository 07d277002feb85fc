//! Gateway configuration.

use serde::{Deserialize, Serialize};

/// Downstream server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Liveness probe interval for each downstream connection.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Allowed CORS origin for the REST surface.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Maximum concurrent downstream WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Per-connection outbound queue; updates beyond it are dropped.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

fn default_port() -> u16 {
    3001
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_outbound_queue_capacity() -> usize {
    256
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            cors_origin: default_cors_origin(),
            max_connections: default_max_connections(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}
