//! Feed error types.

use medtrack_core::Symbol;
use medtrack_ws::WsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Malformed trade message: {0}")]
    Malformed(String),

    #[error("Symbol is not tracked: {0}")]
    UntrackedSymbol(Symbol),

    #[error("Upstream reconnection exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Connection task failed: {0}")]
    TaskFailed(String),

    #[error("Upstream error: {0}")]
    Ws(#[from] WsError),
}

pub type FeedResult<T> = Result<T, FeedError>;
