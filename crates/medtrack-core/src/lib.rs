//! Core domain types for the median tracker.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `Symbol`: normalized (lower-case) traded pair identifier
//! - `Price`: precision-safe decimal price
//! - `MedianTracker`: two-heap streaming median over an append-only series
//! - `TradeEvent`, `MedianSnapshot`, `MedianUpdate`: data flowing between
//!   the upstream feed, the tracker registry and downstream subscribers

pub mod decimal;
pub mod error;
pub mod median;
pub mod symbol;
pub mod types;

pub use decimal::Price;
pub use error::{CoreError, Result};
pub use median::{MedianTracker, TrackerStats};
pub use symbol::Symbol;
pub use types::{MedianSnapshot, MedianUpdate, SnapshotSet, TradeEvent};
