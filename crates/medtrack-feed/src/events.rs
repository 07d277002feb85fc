//! Publish/subscribe point for feed events.

use medtrack_core::MedianUpdate;
use tokio::sync::broadcast;

/// Event raised by the upstream connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// A trade was applied to a tracker.
    MedianUpdate(MedianUpdate),
    /// Reconnection was exhausted; no further updates will follow.
    Exhausted { attempts: u32 },
}

/// Broadcast bus connecting the connector to any number of consumers.
///
/// Slow consumers lag rather than block the publisher.
#[derive(Debug, Clone)]
pub struct FeedEventBus {
    tx: broadcast::Sender<FeedEvent>,
}

impl FeedEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns the number of consumers it reached.
    pub fn publish(&self, event: FeedEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}
