//! Downstream wire types.
//!
//! Inbound control messages are `{type, pair?}`; outbound messages are
//! tagged by `type`. REST response bodies live here too.

use chrono::{DateTime, Utc};
use medtrack_core::{MedianSnapshot, MedianUpdate, Price, SnapshotSet, Symbol};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const WELCOME_MESSAGE: &str = "Connected to median tracker";

/// A decoded inbound control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Subscribe(Symbol),
    Unsubscribe(Symbol),
    GetMedian(Symbol),
    GetAllMedians,
    Ping,
}

impl ControlRequest {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, ControlError> {
        let value: Value = serde_json::from_str(text).map_err(|_| ControlError::InvalidFormat)?;
        let Value::Object(fields) = value else {
            return Err(ControlError::InvalidFormat);
        };

        let kind = fields.get("type");
        let pair = || pair_arg(fields.get("pair"));

        match kind.and_then(Value::as_str) {
            Some("subscribe") => Ok(Self::Subscribe(pair()?)),
            Some("unsubscribe") => Ok(Self::Unsubscribe(pair()?)),
            Some("getMedian") => Ok(Self::GetMedian(pair()?)),
            Some("getAllMedians") => Ok(Self::GetAllMedians),
            Some("ping") => Ok(Self::Ping),
            Some(other) => Err(ControlError::UnknownType(other.to_string())),
            None => Err(ControlError::UnknownType(
                kind.map_or_else(|| "none".to_string(), Value::to_string),
            )),
        }
    }
}

/// The pair argument must be a non-empty string.
fn pair_arg(value: Option<&Value>) -> Result<Symbol, ControlError> {
    value
        .and_then(Value::as_str)
        .and_then(|s| Symbol::parse(s).ok())
        .ok_or(ControlError::InvalidPair)
}

/// Control-message failure. `Display` is the text sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("Invalid message format")]
    InvalidFormat,

    #[error("Invalid pair format")]
    InvalidPair,

    #[error("Pair {pair} not available")]
    PairUnavailable { pair: Symbol, available: Vec<Symbol> },

    #[error("No data available for pair {pair}")]
    NotFound { pair: Symbol, available: Vec<Symbol> },

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

impl ControlError {
    pub fn available_pairs(&self) -> Option<&[Symbol]> {
        match self {
            Self::PairUnavailable { available, .. } | Self::NotFound { available, .. } => {
                Some(available)
            }
            _ => None,
        }
    }
}

impl From<ControlError> for ServerMessage {
    fn from(err: ControlError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
            available_pairs: err.available_pairs().map(<[Symbol]>::to_vec),
        }
    }
}

/// Outbound message to a downstream connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Welcome {
        pairs: Vec<Symbol>,
        message: String,
    },
    Median {
        data: MedianSnapshot,
    },
    AllMedians {
        data: SnapshotSet,
    },
    MedianUpdate {
        data: MedianUpdate,
    },
    Subscribed {
        pair: Symbol,
        message: String,
    },
    Unsubscribed {
        pair: Symbol,
        message: String,
    },
    Pong,
    Error {
        message: String,
        #[serde(rename = "availablePairs", skip_serializing_if = "Option::is_none")]
        available_pairs: Option<Vec<Symbol>>,
    },
}

impl ServerMessage {
    pub fn welcome(pairs: Vec<Symbol>) -> Self {
        Self::Welcome {
            pairs,
            message: WELCOME_MESSAGE.to_string(),
        }
    }

    pub fn subscribed(pair: Symbol) -> Self {
        let message = format!("Successfully subscribed to {pair}");
        Self::Subscribed { pair, message }
    }

    pub fn unsubscribed(pair: Symbol) -> Self {
        let message = format!("Successfully unsubscribed from {pair}");
        Self::Unsubscribed { pair, message }
    }

    /// Wire label of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Median { .. } => "median",
            Self::AllMedians { .. } => "allMedians",
            Self::MedianUpdate { .. } => "medianUpdate",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
        }
    }
}

/// `GET /median`.
#[derive(Debug, Serialize)]
pub struct MedianListResponse {
    pub success: bool,
    pub count: usize,
    pub data: SnapshotSet,
}

/// `GET /median/{pair}`.
#[derive(Debug, Serialize)]
pub struct MedianResponse {
    pub success: bool,
    pub data: MedianSnapshot,
}

/// 404 body for an untracked pair.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairNotFoundResponse {
    pub error: &'static str,
    pub message: String,
    pub available_pairs: Vec<Symbol>,
}

impl PairNotFoundResponse {
    pub fn new(pair: &str, available_pairs: Vec<Symbol>) -> Self {
        Self {
            error: "Pair not found",
            message: format!("The pair {pair} is not being tracked"),
            available_pairs,
        }
    }
}

/// One row of `GET /median/stats/all`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStats {
    pub pair: Symbol,
    pub count: u64,
    pub median: Option<Price>,
    pub max_heap_size: usize,
    pub min_heap_size: usize,
    pub latest_price: Option<Price>,
}

impl From<&MedianSnapshot> for PairStats {
    fn from(snapshot: &MedianSnapshot) -> Self {
        Self {
            pair: snapshot.pair.clone(),
            count: snapshot.stats.count,
            median: snapshot.stats.median,
            max_heap_size: snapshot.stats.max_heap_size,
            min_heap_size: snapshot.stats.min_heap_size,
            latest_price: snapshot.latest_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: Vec<PairStats>,
}

/// `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
    pub pairs: Vec<Symbol>,
    /// Upstream connection state.
    pub feed: &'static str,
    pub connections: usize,
    pub timestamp: DateTime<Utc>,
}
