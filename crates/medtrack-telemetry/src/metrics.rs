//! Prometheus metrics for the median tracker.
//!
//! Covers:
//! - Upstream connection state and reconnects
//! - Applied and malformed trades
//! - Downstream connections and fan-out delivery
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error caught at first use.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_int_gauge, Counter, CounterVec, Encoder, Gauge, GaugeVec, IntGauge, TextEncoder,
};

/// Upstream connection state (1 = connected, 0 = not connected).
pub static FEED_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "medtrack_feed_connected",
        "Upstream feed connection state (1=connected)"
    )
    .unwrap()
});

/// Upstream state machine current state.
/// Labels: state (disconnected/connecting/connected/awaiting_reconnect/failed)
pub static FEED_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "medtrack_feed_state",
        "Upstream state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

pub static FEED_RECONNECT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "medtrack_feed_reconnect_total",
        "Total upstream reconnection cycles"
    )
    .unwrap()
});

/// Set to 1 once reconnection is exhausted; never cleared.
pub static FEED_EXHAUSTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "medtrack_feed_exhausted",
        "Upstream reconnection exhausted (1=live updates stopped)"
    )
    .unwrap()
});

pub static TRADES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "medtrack_trades_total",
        "Trades applied to a median tracker",
        &["symbol"]
    )
    .unwrap()
});

/// Labels: source (upstream/downstream)
pub static MALFORMED_MESSAGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "medtrack_malformed_messages_total",
        "Messages dropped because they could not be decoded",
        &["source"]
    )
    .unwrap()
});

pub static DOWNSTREAM_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "medtrack_downstream_connections",
        "Open downstream subscriber connections"
    )
    .unwrap()
});

pub static FANOUT_DELIVERED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "medtrack_fanout_delivered_total",
        "Update messages queued to subscribers"
    )
    .unwrap()
});

pub static FANOUT_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "medtrack_fanout_dropped_total",
        "Update messages dropped because a subscriber queue was full or closed"
    )
    .unwrap()
});

pub static HEARTBEAT_TERMINATIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "medtrack_heartbeat_terminations_total",
        "Downstream connections terminated for missing a heartbeat"
    )
    .unwrap()
});

const FEED_STATES: [&str; 5] = [
    "disconnected",
    "connecting",
    "connected",
    "awaiting_reconnect",
    "failed",
];

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set the upstream state; only the active state is 1.
    pub fn feed_state_set(state: &str) {
        for s in FEED_STATES {
            FEED_STATE.with_label_values(&[s]).set(0.0);
        }
        FEED_STATE.with_label_values(&[state]).set(1.0);
        FEED_CONNECTED.set(if state == "connected" { 1.0 } else { 0.0 });
    }

    pub fn feed_reconnect() {
        FEED_RECONNECT_TOTAL.inc();
    }

    pub fn feed_exhausted() {
        FEED_EXHAUSTED.set(1);
    }

    pub fn trade_applied(symbol: &str) {
        TRADES_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn malformed_message(source: &str) {
        MALFORMED_MESSAGES_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn downstream_connected() {
        DOWNSTREAM_CONNECTIONS.inc();
    }

    pub fn downstream_disconnected() {
        DOWNSTREAM_CONNECTIONS.dec();
    }

    pub fn fanout_delivered() {
        FANOUT_DELIVERED_TOTAL.inc();
    }

    pub fn fanout_dropped() {
        FANOUT_DROPPED_TOTAL.inc();
    }

    pub fn heartbeat_terminated() {
        HEARTBEAT_TERMINATIONS_TOTAL.inc();
    }

    /// Render every registered metric in the text exposition format.
    pub fn encode() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
