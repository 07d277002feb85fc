//! Decoding of the exchange's combined trade stream.
//!
//! Frames look like:
//! `{"stream":"btcusdt@trade","data":{"e":"trade","s":"BTCUSDT","p":"67000.01","T":1700000000000}}`
//!
//! Frames without `data`, or whose `data.e` is not `trade`, are not errors;
//! they decode to `None`.

use crate::error::{FeedError, FeedResult};
use medtrack_core::{Price, Symbol, TradeEvent};
use serde::Deserialize;
use serde_json::Value;

const TRADE_EVENT: &str = "trade";

#[derive(Debug, Deserialize)]
struct CombinedFrame {
    #[serde(default)]
    data: Option<Value>,
}

/// Trade payload fields used by the tracker.
#[derive(Debug, Deserialize)]
struct RawTrade {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time: i64,
}

/// Stateless decoder for upstream frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct TradeParser;

impl TradeParser {
    /// Decode one text frame.
    ///
    /// Returns `Ok(None)` for frames that are not trades and
    /// `Err(FeedError::Malformed)` for frames that cannot be decoded.
    pub fn parse(text: &str) -> FeedResult<Option<TradeEvent>> {
        let frame: CombinedFrame = serde_json::from_str(text)
            .map_err(|e| FeedError::Malformed(format!("invalid JSON: {e}")))?;

        let Some(data) = frame.data else {
            return Ok(None);
        };
        if data.get("e").and_then(Value::as_str) != Some(TRADE_EVENT) {
            return Ok(None);
        }

        let raw = RawTrade::deserialize(&data)
            .map_err(|e| FeedError::Malformed(format!("invalid trade payload: {e}")))?;

        let symbol = Symbol::parse(&raw.symbol)
            .map_err(|e| FeedError::Malformed(e.to_string()))?;
        let price = Price::parse_positive(&raw.price)
            .map_err(|e| FeedError::Malformed(e.to_string()))?;
        let trade = TradeEvent::from_epoch_ms(symbol, price, raw.trade_time)
            .map_err(|e| FeedError::Malformed(e.to_string()))?;

        Ok(Some(trade))
    }
}

/// Combined-stream URL subscribing to the trade channel of every symbol.
pub fn combined_stream_url(base: &str, symbols: &[Symbol]) -> String {
    let streams = symbols
        .iter()
        .map(Symbol::trade_stream)
        .collect::<Vec<_>>()
        .join("/");
    format!("{base}?streams={streams}")
}
