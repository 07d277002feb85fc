//! Upstream trade feed for the median tracker.
//!
//! Decodes the exchange's combined trade stream, applies each trade to the
//! symbol's [`MedianTracker`](medtrack_core::MedianTracker) held in the
//! [`TrackerRegistry`], and publishes a [`FeedEvent`] for every applied
//! trade on the [`FeedEventBus`].

pub mod connector;
pub mod error;
pub mod events;
pub mod parser;
pub mod registry;

pub use connector::UpstreamFeedConnector;
pub use error::{FeedError, FeedResult};
pub use events::{FeedEvent, FeedEventBus};
pub use parser::{combined_stream_url, TradeParser};
pub use registry::TrackerRegistry;
