//! medtrack-gateway - downstream surface of the median tracker.
//!
//! - [`SubscriptionBroadcaster`]: per-connection subscription sets and
//!   symbol-filtered fan-out of feed updates
//! - Downstream WebSocket sessions with liveness probing
//! - Read-only REST snapshots, health and Prometheus metrics
//!
//! # Architecture
//!
//! ```text
//! FeedEventBus ──► run_fanout ──► SubscriptionBroadcaster ──► session queues
//!                                        │
//! TrackerRegistry ◄── REST / getMedian ──┘
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod types;

pub use broadcast::{run_fanout, ConnectionId, FanoutStats, SubscriptionBroadcaster};
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use server::{create_router, serve, AppState, ConnectionLimiter};
pub use session::{run_session, SessionEnd, SessionSettings};
pub use types::{ControlError, ControlRequest, ServerMessage};
