//! Per-symbol median trackers.
//!
//! Each tracked symbol owns one entry behind its own lock, so a trade for
//! one symbol never waits on readers of another. Only the upstream
//! connector writes; snapshot readers take the read lock.

use crate::error::{FeedError, FeedResult};
use chrono::Utc;
use dashmap::DashMap;
use medtrack_core::{
    MedianSnapshot, MedianTracker, MedianUpdate, Price, SnapshotSet, Symbol, TrackerStats,
    TradeEvent,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Tracker state for one symbol.
#[derive(Debug, Default)]
struct TrackerEntry {
    tracker: MedianTracker,
    latest_price: Option<Price>,
}

impl TrackerEntry {
    fn apply(&mut self, price: Price) -> TrackerStats {
        self.tracker.insert(price);
        self.latest_price = Some(price);
        self.tracker.stats()
    }

    fn snapshot(&self, pair: &Symbol) -> MedianSnapshot {
        let stats = self.tracker.stats();
        MedianSnapshot {
            pair: pair.clone(),
            median: stats.median,
            stats,
            latest_price: self.latest_price,
            timestamp: Utc::now(),
        }
    }
}

/// Registry of tracked symbols and their trackers.
#[derive(Debug, Default)]
pub struct TrackerRegistry {
    /// Registration order, used by `snapshot_all` and `symbols`.
    order: RwLock<Vec<Symbol>>,
    entries: DashMap<Symbol, Arc<RwLock<TrackerEntry>>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry tracking `symbols` in the given order.
    pub fn with_symbols<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = Symbol>,
    {
        let registry = Self::new();
        for symbol in symbols {
            registry.track(symbol);
        }
        registry
    }

    /// Start tracking `symbol`. Returns `false` if it was already tracked.
    pub fn track(&self, symbol: Symbol) -> bool {
        let mut order = self.order.write();
        if self.entries.contains_key(&symbol) {
            return false;
        }
        debug!(symbol = %symbol, "Tracking symbol");
        self.entries
            .insert(symbol.clone(), Arc::new(RwLock::new(TrackerEntry::default())));
        order.push(symbol);
        true
    }

    fn entry(&self, symbol: &str) -> Option<Arc<RwLock<TrackerEntry>>> {
        self.entries.get(symbol).map(|e| Arc::clone(e.value()))
    }

    /// Record one price for `symbol`.
    pub fn update(&self, symbol: &Symbol, price: Price) -> FeedResult<TrackerStats> {
        let entry = self
            .entry(symbol.as_str())
            .ok_or_else(|| FeedError::UntrackedSymbol(symbol.clone()))?;
        let stats = entry.write().apply(price);
        Ok(stats)
    }

    /// Record a decoded trade and build the update event for it.
    pub fn apply(&self, trade: &TradeEvent) -> FeedResult<MedianUpdate> {
        let stats = self.update(&trade.symbol, trade.price)?;
        Ok(MedianUpdate {
            pair: trade.symbol.clone(),
            price: trade.price,
            median: stats.median,
            timestamp: trade.event_time,
            count: stats.count,
        })
    }

    /// Current snapshot, `None` if the symbol is not tracked.
    pub fn snapshot(&self, symbol: &str) -> Option<MedianSnapshot> {
        let (pair, entry) = {
            let guard = self.entries.get(symbol)?;
            (guard.key().clone(), Arc::clone(guard.value()))
        };
        let snapshot = entry.read().snapshot(&pair);
        Some(snapshot)
    }

    /// Snapshots of every tracked symbol in registration order.
    pub fn snapshot_all(&self) -> SnapshotSet {
        let symbols = self.symbols();
        SnapshotSet(
            symbols
                .iter()
                .filter_map(|s| self.snapshot(s.as_str()))
                .collect(),
        )
    }

    /// Tracked symbols in registration order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.order.read().clone()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
