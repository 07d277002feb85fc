//! Streaming median tracker service.
//!
//! Wires the components together:
//! - Symbol selection from exchange metadata
//! - Upstream trade feed with reconnect and liveness handling
//! - Per-pair median trackers
//! - Downstream subscription fan-out, REST snapshots and metrics

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
