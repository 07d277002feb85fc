//! Upstream WebSocket client for the market-data feed.
//!
//! Provides one resilient outbound connection with:
//! - A five-state connection state machine observable through a watch channel
//! - Exponential reconnect backoff `min(base * 2^attempt, max)` with an attempt cap
//! - Liveness probes (protocol ping) with pong-before-next-probe detection
//! - Terminal `Failed` state once reconnection is exhausted
//! - Channel-based forwarding of inbound text frames

pub mod connection;
pub mod error;
pub mod heartbeat;

pub use connection::{backoff_delay, ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{WsError, WsResult};
pub use heartbeat::{HeartbeatManager, HeartbeatStats, ProbeDecision};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any TLS connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
