//! Streaming median over an append-only price series.
//!
//! Two heaps split the observations:
//! - `low`: the smaller half, max-heap (peek = largest of the small half)
//! - `high`: the larger half, min-heap (peek = smallest of the large half)
//!
//! After every insertion `low.len() - high.len()` is 0 or 1 and
//! `max(low) <= min(high)`, so the median is read from the heap tops in O(1).
//! There is no removal; the tracker only grows.

use crate::decimal::Price;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Per-symbol running median.
#[derive(Debug, Clone, Default)]
pub struct MedianTracker {
    low: BinaryHeap<Price>,
    high: BinaryHeap<Reverse<Price>>,
    count: u64,
}

/// Tracker statistics.
///
/// `max_heap_size` is the size of the lower half, `min_heap_size` the size
/// of the upper half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub count: u64,
    pub median: Option<Price>,
    pub max_heap_size: usize,
    pub min_heap_size: usize,
}

impl MedianTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one observation. O(log n).
    pub fn insert(&mut self, price: Price) {
        self.count += 1;

        match self.low.peek() {
            None => {
                self.low.push(price);
                return;
            }
            Some(&max_low) if price <= max_low => self.low.push(price),
            Some(_) => self.high.push(Reverse(price)),
        }

        self.rebalance();
    }

    fn rebalance(&mut self) {
        if self.low.len() > self.high.len() + 1 {
            if let Some(moved) = self.low.pop() {
                self.high.push(Reverse(moved));
            }
        } else if self.high.len() > self.low.len() {
            if let Some(Reverse(moved)) = self.high.pop() {
                self.low.push(moved);
            }
        }
    }

    /// Current median, `None` before the first observation. O(1).
    pub fn median(&self) -> Option<Price> {
        let max_low = *self.low.peek()?;
        if self.count % 2 == 1 {
            return Some(max_low);
        }
        match self.high.peek() {
            Some(&Reverse(min_high)) => Some(max_low.midpoint(min_high)),
            None => Some(max_low),
        }
    }

    /// Number of observations inserted so far.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            count: self.count,
            median: self.median(),
            max_heap_size: self.low.len(),
            min_heap_size: self.high.len(),
        }
    }
}
