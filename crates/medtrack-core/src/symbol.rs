//! Traded pair identifier.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Normalized (lower-case) identifier for one traded pair, e.g. `btcusdt`.
///
/// Construction always lower-cases, so two symbols compare equal exactly
/// when their normalized forms do.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize and validate a raw identifier.
    ///
    /// Only the empty string is rejected; anything else is accepted and
    /// lower-cased. Whether the symbol is actually tracked is a separate
    /// question answered by the tracker registry.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CoreError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(raw.to_lowercase()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upstream stream name for this symbol's trade channel.
    pub fn trade_stream(&self) -> String {
        format!("{}@trade", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}
