//! Precision-safe decimal price.
//!
//! Uses `rust_decimal` for exact decimal arithmetic so that upstream price
//! strings survive parsing unchanged and the even-count median (an average
//! of two prices) never picks up binary rounding noise.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Parse an upstream numeric string, rejecting zero and negative values.
    pub fn parse_positive(s: &str) -> Result<Self> {
        let price: Self = s.trim().parse()?;
        if !price.is_positive() {
            return Err(CoreError::InvalidPrice(s.to_string()));
        }
        Ok(price)
    }

    /// Arithmetic mean of two prices.
    ///
    /// Computed as `lo + (hi - lo) / 2`, which stays within `[lo, hi]` and
    /// never overflows for prices anywhere in the decimal range.
    pub fn midpoint(self, other: Self) -> Self {
        let (lo, hi) = if self.0 <= other.0 {
            (self.0, other.0)
        } else {
            (other.0, self.0)
        };
        match hi.checked_sub(lo) {
            Some(spread) => Self(lo.checked_add(spread / Decimal::TWO).unwrap_or(hi)),
            // Opposite signs: the halves cannot overflow when summed.
            None => Self(lo / Decimal::TWO + hi / Decimal::TWO),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}
