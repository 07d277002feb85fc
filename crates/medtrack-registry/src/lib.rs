//! Exchange metadata discovery and tracked-symbol selection.
//!
//! Fetches the exchange's symbol list, keeps the pairs that are trading
//! against the configured quote asset, and picks a random subset to track.
//! Falls back to a configured default list when discovery fails.

pub mod client;
pub mod error;
pub mod selection;

pub use client::{ExchangeInfoClient, ExchangeInfoResponse, ExchangeSymbol};
pub use error::{RegistryError, RegistryResult};
pub use selection::{resolve_symbols, select_symbols, SelectionPolicy};
