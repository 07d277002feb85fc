//! Data types exchanged between the feed, the registry and subscribers.

use crate::decimal::Price;
use crate::error::{CoreError, Result};
use crate::median::TrackerStats;
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One decoded upstream execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    pub symbol: Symbol,
    pub price: Price,
    pub event_time: DateTime<Utc>,
}

impl TradeEvent {
    pub fn new(symbol: Symbol, price: Price, event_time: DateTime<Utc>) -> Self {
        Self {
            symbol,
            price,
            event_time,
        }
    }

    /// Build from an epoch-milliseconds event time as sent upstream.
    pub fn from_epoch_ms(symbol: Symbol, price: Price, event_time_ms: i64) -> Result<Self> {
        let event_time = DateTime::from_timestamp_millis(event_time_ms)
            .ok_or(CoreError::InvalidTimestamp(event_time_ms))?;
        Ok(Self::new(symbol, price, event_time))
    }
}

/// Point-in-time view of one symbol's tracker.
///
/// Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedianSnapshot {
    pub pair: Symbol,
    pub median: Option<Price>,
    pub stats: TrackerStats,
    pub latest_price: Option<Price>,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl MedianSnapshot {
    #[inline]
    pub fn observation_count(&self) -> u64 {
        self.stats.count
    }
}

/// Update event raised for every applied trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedianUpdate {
    pub pair: Symbol,
    pub price: Price,
    pub median: Option<Price>,
    /// Upstream event time of the trade.
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

/// Snapshots of every tracked symbol in registration order.
///
/// Serializes as a JSON object keyed by pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSet(pub Vec<MedianSnapshot>);

impl SnapshotSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MedianSnapshot> {
        self.0.iter()
    }
}

impl Serialize for SnapshotSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for snapshot in &self.0 {
            map.serialize_entry(snapshot.pair.as_str(), snapshot)?;
        }
        map.end()
    }
}
