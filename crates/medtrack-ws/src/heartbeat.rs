//! Heartbeat management for the upstream connection.
//!
//! A probe is sent every `interval_ms`. The pong for a probe must arrive
//! before the next probe is due; if it has not, the connection is treated as
//! dead exactly like a close.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

/// Result of a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeDecision {
    /// Previous probe answered (or none sent yet); send a new one.
    SendProbe,
    /// Previous probe went unanswered for a whole interval.
    TimedOut,
}

#[derive(Debug, Default)]
struct ProbeState {
    last_ping: Option<DateTime<Utc>>,
    last_pong: Option<DateTime<Utc>>,
    waiting_for_pong: bool,
}

/// Heartbeat manager for upstream connection health.
#[derive(Debug)]
pub struct HeartbeatManager {
    interval_ms: u64,
    state: RwLock<ProbeState>,
}

impl HeartbeatManager {
    /// Create a new heartbeat manager.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            state: RwLock::new(ProbeState::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Reset heartbeat state (called on every new connection).
    pub fn reset(&self) {
        *self.state.write() = ProbeState::default();
    }

    /// Decide what to do when the probe interval elapses.
    pub fn on_tick(&self) -> ProbeDecision {
        if self.state.read().waiting_for_pong {
            ProbeDecision::TimedOut
        } else {
            ProbeDecision::SendProbe
        }
    }

    /// Record that a ping was sent.
    pub fn record_ping(&self) {
        let now = Utc::now();
        let mut state = self.state.write();
        state.last_ping = Some(now);
        state.waiting_for_pong = true;
        debug!(time = %now, "Recorded ping");
    }

    /// Record that a pong was received.
    pub fn record_pong(&self) {
        let now = Utc::now();
        let mut state = self.state.write();
        state.last_pong = Some(now);
        state.waiting_for_pong = false;

        if let Some(ping_time) = state.last_ping {
            let rtt_ms = (now - ping_time).num_milliseconds();
            debug!(rtt_ms, "Received pong");
        }
    }

    pub fn is_waiting_for_pong(&self) -> bool {
        self.state.read().waiting_for_pong
    }

    /// Get heartbeat statistics.
    pub fn stats(&self) -> HeartbeatStats {
        let state = self.state.read();
        HeartbeatStats {
            last_ping: state.last_ping,
            last_pong: state.last_pong,
            waiting_for_pong: state.waiting_for_pong,
        }
    }
}

/// Heartbeat statistics.
#[derive(Debug, Clone)]
pub struct HeartbeatStats {
    pub last_ping: Option<DateTime<Utc>>,
    pub last_pong: Option<DateTime<Utc>>,
    pub waiting_for_pong: bool,
}
