//! Upstream feed connector.
//!
//! Owns the upstream [`ConnectionManager`] and the receiving end of its
//! frame channel. Every text frame is decoded, applied to the
//! [`TrackerRegistry`] and published as a [`FeedEvent::MedianUpdate`].
//! When the connection manager gives up, a single [`FeedEvent::Exhausted`]
//! is published and `run` returns [`FeedError::Exhausted`].

use crate::error::{FeedError, FeedResult};
use crate::events::{FeedEvent, FeedEventBus};
use crate::parser::{combined_stream_url, TradeParser};
use crate::registry::TrackerRegistry;
use medtrack_core::MedianUpdate;
use medtrack_telemetry::Metrics;
use medtrack_ws::{ConnectionConfig, ConnectionManager, ConnectionState, WsError};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

pub struct UpstreamFeedConnector {
    connection: Arc<ConnectionManager>,
    frames_rx: mpsc::Receiver<String>,
    registry: Arc<TrackerRegistry>,
    bus: FeedEventBus,
}

impl UpstreamFeedConnector {
    /// Build a connector for every symbol currently in `registry`.
    ///
    /// `config.url` is the combined-stream base URL; the stream list is
    /// appended here.
    pub fn new(
        mut config: ConnectionConfig,
        registry: Arc<TrackerRegistry>,
        bus: FeedEventBus,
        channel_capacity: usize,
    ) -> Self {
        config.url = combined_stream_url(&config.url, &registry.symbols());
        let (frames_tx, frames_rx) = mpsc::channel(channel_capacity.max(1));
        let connection = Arc::new(ConnectionManager::new(config, frames_tx));

        Self {
            connection,
            frames_rx,
            registry,
            bus,
        }
    }

    /// Handle to the connection, for shutdown and state observation.
    pub fn connection(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.connection)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe_state()
    }

    /// Decode and apply one upstream frame.
    ///
    /// Returns the published update, or `None` if the frame was not a trade,
    /// was malformed, or named an untracked symbol.
    pub fn handle_frame(&self, text: &str) -> Option<MedianUpdate> {
        let trade = match TradeParser::parse(text) {
            Ok(Some(trade)) => trade,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Dropping malformed upstream message");
                Metrics::malformed_message("upstream");
                return None;
            }
        };

        match self.registry.apply(&trade) {
            Ok(update) => {
                Metrics::trade_applied(update.pair.as_str());
                trace!(
                    pair = %update.pair,
                    price = %update.price,
                    count = update.count,
                    "Median updated"
                );
                self.bus.publish(FeedEvent::MedianUpdate(update.clone()));
                Some(update)
            }
            Err(FeedError::UntrackedSymbol(symbol)) => {
                debug!(symbol = %symbol, "Trade for untracked symbol");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to apply trade");
                None
            }
        }
    }

    /// Run until shutdown (`Ok`) or reconnection exhaustion (`Err`).
    pub async fn run(mut self) -> FeedResult<()> {
        let state_task = tokio::spawn(mirror_state(self.connection.subscribe_state()));

        let connection = Arc::clone(&self.connection);
        let mut connect_task = tokio::spawn(async move { connection.connect().await });

        info!(symbols = self.registry.len(), "Upstream feed connector started");

        let joined = loop {
            tokio::select! {
                Some(frame) = self.frames_rx.recv() => {
                    self.handle_frame(&frame);
                }
                joined = &mut connect_task => break joined,
            }
        };

        // Frames already read before the connection ended still count.
        while let Ok(frame) = self.frames_rx.try_recv() {
            self.handle_frame(&frame);
        }
        state_task.abort();
        Metrics::feed_state_set(self.connection.state().as_str());

        match joined {
            Ok(Ok(())) => {
                info!("Upstream feed connector stopped");
                Ok(())
            }
            Ok(Err(WsError::ReconnectExhausted { attempts })) => {
                error!(attempts, "Upstream feed exhausted, live updates stopped");
                Metrics::feed_exhausted();
                self.bus.publish(FeedEvent::Exhausted { attempts });
                Err(FeedError::Exhausted { attempts })
            }
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(FeedError::TaskFailed(e.to_string())),
        }
    }
}

/// Mirror connection state changes into metrics.
async fn mirror_state(mut state_rx: watch::Receiver<ConnectionState>) {
    Metrics::feed_state_set(state_rx.borrow_and_update().as_str());
    while state_rx.changed().await.is_ok() {
        let state = *state_rx.borrow_and_update();
        Metrics::feed_state_set(state.as_str());
        if state == ConnectionState::AwaitingReconnect {
            Metrics::feed_reconnect();
        }
    }
}
