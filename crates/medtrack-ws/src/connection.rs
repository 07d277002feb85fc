//! Upstream connection manager.
//!
//! Owns the connection state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> AwaitingReconnect -> Connecting ...
//!                                                  \
//!                                                   -> Failed (terminal)
//! ```
//!
//! The reconnect counter is reset on every successful handshake and
//! incremented once per reconnect cycle. When it would exceed
//! `max_reconnect_attempts` the manager enters `Failed` and `connect()`
//! returns `WsError::ReconnectExhausted`; nothing reconnects after that.

use crate::error::{WsError, WsResult};
use crate::heartbeat::{HeartbeatManager, ProbeDecision};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Full WebSocket URL, including the stream query.
    pub url: String,
    /// Reconnect cycles allowed before entering `Failed` (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Liveness probe interval; the pong must arrive before the next probe.
    pub heartbeat_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30_000,
            heartbeat_interval_ms: 30_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    AwaitingReconnect,
    /// Terminal. Recovery requires an external restart.
    Failed,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 5] = [
        Self::Disconnected,
        Self::Connecting,
        Self::Connected,
        Self::AwaitingReconnect,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::AwaitingReconnect => "awaiting_reconnect",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backoff before reconnect cycle `attempt` (1-based): `min(base * 2^attempt, max)`.
///
/// With the defaults, attempts 1..=6 wait 2s, 4s, 8s, 16s, 30s, 30s.
pub fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Upstream WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    heartbeat: HeartbeatManager,
    /// Inbound text frames, in arrival order.
    message_tx: mpsc::Sender<String>,
    reconnect_count: RwLock<u32>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(config: ConnectionConfig, message_tx: mpsc::Sender<String>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            heartbeat: HeartbeatManager::new(config.heartbeat_interval_ms),
            config,
            state_tx,
            message_tx,
            reconnect_count: RwLock::new(0),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Reconnect cycles since the last successful handshake.
    pub fn reconnect_attempts(&self) -> u32 {
        *self.reconnect_count.read()
    }

    pub fn heartbeat(&self) -> &HeartbeatManager {
        &self.heartbeat
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Signal graceful shutdown.
    ///
    /// Cancels the shutdown token, which makes both the message loop and the
    /// backoff sleep exit promptly.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "Connection state changed");
        }
    }

    /// Connect and keep the connection alive until shutdown or exhaustion.
    ///
    /// Returns `Ok(())` after a requested shutdown and
    /// `Err(WsError::ReconnectExhausted)` once the attempt cap is hit.
    pub async fn connect(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            match self.try_connect().await {
                Ok(()) => info!("Upstream connection closed"),
                Err(e) => warn!(error = %e, reason = e.reason(), "Upstream connection lost"),
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            let max = self.config.max_reconnect_attempts;
            let next_attempt = {
                let mut count = self.reconnect_count.write();
                if max > 0 && *count >= max {
                    None
                } else {
                    *count += 1;
                    Some(*count)
                }
            };

            let Some(attempt) = next_attempt else {
                self.set_state(ConnectionState::Failed);
                error!(attempts = max, "Max reconnection attempts reached, feed stopped");
                return Err(WsError::ReconnectExhausted { attempts: max });
            };

            self.set_state(ConnectionState::AwaitingReconnect);

            let delay = backoff_delay(
                attempt,
                self.config.reconnect_base_delay_ms,
                self.config.reconnect_max_delay_ms,
            );
            warn!(
                attempt,
                max_attempts = max,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            // Cancellation-aware sleep
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to upstream feed");

        // The handshake shares the probe interval as its deadline.
        let handshake_timeout = self.heartbeat.interval();
        let handshake = tokio::time::timeout(
            handshake_timeout,
            connect_async_tls_with_config(&self.config.url, None, true, None),
        );
        let (ws_stream, _response) = tokio::select! {
            result = handshake => match result {
                Ok(connected) => connected?,
                Err(_) => {
                    return Err(WsError::ConnectionFailed(format!(
                        "handshake not completed within {}ms",
                        handshake_timeout.as_millis()
                    )));
                }
            },
            () = self.shutdown_token.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        *self.reconnect_count.write() = 0;
        info!("Upstream feed connected");

        self.heartbeat.reset();
        let period = self.heartbeat.interval();
        let mut probe = tokio::time::interval_at(Instant::now() + period, period);
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if self.message_tx.send(text).await.is_err() {
                                // Nobody consumes frames any more; stop for good.
                                warn!("Frame receiver dropped, closing upstream connection");
                                self.shutdown_token.cancel();
                                let _ = write.send(Message::Close(None)).await;
                                self.set_state(ConnectionState::Disconnected);
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Upstream closed the connection");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Upstream read error");
                            return Err(e.into());
                        }
                        None => {
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                        Some(Ok(_)) => {}
                    }
                }

                _ = probe.tick() => {
                    match self.heartbeat.on_tick() {
                        ProbeDecision::TimedOut => {
                            error!(interval_ms = self.heartbeat.interval_ms(), "Heartbeat timeout");
                            return Err(WsError::HeartbeatTimeout {
                                interval_ms: self.heartbeat.interval_ms(),
                            });
                        }
                        ProbeDecision::SendProbe => {
                            write.send(Message::Ping(Vec::new())).await?;
                            self.heartbeat.record_ping();
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.reconnect_base_delay_ms, 1000);
        assert_eq!(config.reconnect_max_delay_ms, 30_000);
    }

    #[test]
    fn test_backoff_sequence_is_capped() {
        let delays: Vec<u128> = (1..=6)
            .map(|attempt| backoff_delay(attempt, 1000, 30_000).as_millis())
            .collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        assert_eq!(
            backoff_delay(200, 1000, 30_000),
            Duration::from_millis(30_000)
        );
        assert_eq!(
            backoff_delay(63, u64::MAX, u64::MAX),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let (tx, _rx) = mpsc::channel(1);
        let manager = ConnectionManager::new(ConnectionConfig::default(), tx);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[test]
    fn test_state_labels_are_unique() {
        let mut labels: Vec<&str> = ConnectionState::ALL.iter().map(|s| s.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), ConnectionState::ALL.len());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::AwaitingReconnect.is_terminal());
    }

    #[tokio::test]
    async fn test_shutdown_before_connect_returns_ok() {
        let (tx, _rx) = mpsc::channel(1);
        let manager = ConnectionManager::new(ConnectionConfig::default(), tx);
        manager.shutdown();
        assert!(manager.connect().await.is_ok());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
