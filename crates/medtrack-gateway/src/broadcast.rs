//! Subscription-based fan-out.
//!
//! Every downstream connection registers an outbound queue and a set of
//! subscribed symbols. Update events are delivered only to connections whose
//! set contains the event's symbol. Delivery uses `try_send`: a full or
//! closed queue drops the message for that connection and nobody else is
//! affected.

use crate::types::{ControlError, ControlRequest, ServerMessage};
use dashmap::DashMap;
use medtrack_core::{MedianSnapshot, MedianUpdate, SnapshotSet, Symbol};
use medtrack_feed::{FeedEvent, TrackerRegistry};
use medtrack_telemetry::Metrics;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type ConnectionId = u64;

#[derive(Debug)]
struct ConnectionEntry {
    subscriptions: HashSet<Symbol>,
    outbound: mpsc::Sender<ServerMessage>,
}

/// Result of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutStats {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct SubscriptionBroadcaster {
    registry: Arc<TrackerRegistry>,
    connections: DashMap<ConnectionId, ConnectionEntry>,
    next_id: AtomicU64,
}

impl SubscriptionBroadcaster {
    pub fn new(registry: Arc<TrackerRegistry>) -> Self {
        Self {
            registry,
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<TrackerRegistry> {
        &self.registry
    }

    /// Add a connection to routing with an empty subscription set.
    pub fn register(&self, outbound: mpsc::Sender<ServerMessage>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(
            id,
            ConnectionEntry {
                subscriptions: HashSet::new(),
                outbound,
            },
        );
        Metrics::downstream_connected();
        debug!(connection = id, "Downstream connection registered");
        id
    }

    /// Remove a connection from all routing and release its subscriptions.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            Metrics::downstream_disconnected();
            debug!(connection = id, "Downstream connection deregistered");
        }
        removed
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Symbols `id` is subscribed to, `None` if not registered.
    pub fn subscriptions(&self, id: ConnectionId) -> Option<HashSet<Symbol>> {
        self.connections.get(&id).map(|e| e.subscriptions.clone())
    }

    /// Greeting listing every trackable symbol.
    pub fn welcome(&self) -> ServerMessage {
        ServerMessage::welcome(self.registry.symbols())
    }

    /// Add `symbol` to the connection's set and return its current snapshot.
    ///
    /// Validated against the tracked set at call time.
    pub fn subscribe(
        &self,
        id: ConnectionId,
        symbol: &Symbol,
    ) -> Result<MedianSnapshot, ControlError> {
        let snapshot = self
            .registry
            .snapshot(symbol.as_str())
            .ok_or_else(|| ControlError::PairUnavailable {
                pair: symbol.clone(),
                available: self.registry.symbols(),
            })?;

        if let Some(mut entry) = self.connections.get_mut(&id) {
            entry.subscriptions.insert(symbol.clone());
        }
        info!(connection = id, pair = %symbol, "Client subscribed");
        Ok(snapshot)
    }

    /// Remove `symbol` from the connection's set. Returns whether it was present.
    pub fn unsubscribe(&self, id: ConnectionId, symbol: &Symbol) -> bool {
        let removed = self
            .connections
            .get_mut(&id)
            .is_some_and(|mut entry| entry.subscriptions.remove(symbol));
        info!(connection = id, pair = %symbol, "Client unsubscribed");
        removed
    }

    pub fn query_one(&self, symbol: &Symbol) -> Result<MedianSnapshot, ControlError> {
        self.registry
            .snapshot(symbol.as_str())
            .ok_or_else(|| ControlError::NotFound {
                pair: symbol.clone(),
                available: self.registry.symbols(),
            })
    }

    pub fn query_all(&self) -> SnapshotSet {
        self.registry.snapshot_all()
    }

    /// Handle one inbound text frame, returning the replies in send order.
    pub fn handle_text(&self, id: ConnectionId, text: &str) -> Vec<ServerMessage> {
        let request = match ControlRequest::parse(text) {
            Ok(request) => request,
            Err(e) => {
                if e == ControlError::InvalidFormat {
                    warn!(connection = id, "Invalid downstream message");
                    Metrics::malformed_message("downstream");
                }
                return vec![e.into()];
            }
        };

        let replies = match request {
            ControlRequest::Subscribe(symbol) => self
                .subscribe(id, &symbol)
                .map(|snapshot| {
                    vec![
                        ServerMessage::Median { data: snapshot },
                        ServerMessage::subscribed(symbol),
                    ]
                }),
            ControlRequest::Unsubscribe(symbol) => {
                self.unsubscribe(id, &symbol);
                Ok(vec![ServerMessage::unsubscribed(symbol)])
            }
            ControlRequest::GetMedian(symbol) => self
                .query_one(&symbol)
                .map(|data| vec![ServerMessage::Median { data }]),
            ControlRequest::GetAllMedians => Ok(vec![ServerMessage::AllMedians {
                data: self.query_all(),
            }]),
            ControlRequest::Ping => Ok(vec![ServerMessage::Pong]),
        };

        replies.unwrap_or_else(|e| vec![e.into()])
    }

    /// Deliver `update` to every connection subscribed to its symbol.
    pub fn publish_update(&self, update: &MedianUpdate) -> FanoutStats {
        let mut stats = FanoutStats::default();

        for entry in self.connections.iter() {
            if !entry.subscriptions.contains(&update.pair) {
                continue;
            }
            let message = ServerMessage::MedianUpdate {
                data: update.clone(),
            };
            match entry.outbound.try_send(message) {
                Ok(()) => {
                    stats.delivered += 1;
                    Metrics::fanout_delivered();
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    stats.dropped += 1;
                    Metrics::fanout_dropped();
                    debug!(connection = *entry.key(), pair = %update.pair, "Outbound queue full, update dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    stats.dropped += 1;
                    Metrics::fanout_dropped();
                }
            }
        }

        stats
    }
}

/// Consume feed events and fan them out until shutdown or bus close.
pub async fn run_fanout(
    broadcaster: Arc<SubscriptionBroadcaster>,
    mut events: broadcast::Receiver<FeedEvent>,
    shutdown: CancellationToken,
) {
    info!("Fan-out task started");
    loop {
        tokio::select! {
            result = events.recv() => match result {
                Ok(FeedEvent::MedianUpdate(update)) => {
                    broadcaster.publish_update(&update);
                }
                Ok(FeedEvent::Exhausted { attempts }) => {
                    error!(attempts, "Upstream feed exhausted, serving last-known medians only");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Fan-out lagged behind the feed, skipping");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Feed event bus closed");
                    break;
                }
            },
            () = shutdown.cancelled() => break,
        }
    }
    info!("Fan-out task stopped");
}
