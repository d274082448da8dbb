//! Precision-safe decimal types for trading.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors when snapping values to exchange steps.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Snap `value` to the nearest multiple of `step`.
///
/// Computes `round(value / step) * step` with banker's rounding on the
/// midpoint and strips trailing zeros from the result, so `13.30` comes back
/// as `13.3`. Applying it twice yields the same value.
///
/// # Errors
/// - `InvalidStep` if `step` is zero or negative
/// - `Overflow` if the intermediate quotient does not fit a `Decimal`
pub fn quantize(value: Decimal, step: Decimal) -> Result<Decimal> {
    if step.is_zero() || step.is_sign_negative() {
        return Err(CoreError::InvalidStep(format!(
            "step must be positive, got {step}"
        )));
    }

    let steps = value
        .checked_div(step)
        .ok_or_else(|| CoreError::Overflow(format!("{value} / {step}")))?
        .round();

    steps
        .checked_mul(step)
        .map(|v| v.normalize())
        .ok_or_else(|| CoreError::Overflow(format!("{steps} * {step}")))
}

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with sizes in calculations.
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

    /// Round to the nearest multiple of the tick size.
    #[inline]
    pub fn quantize(&self, tick_size: Price) -> Result<Self> {
        quantize(self.0, tick_size.0).map(Self)
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

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

/// Size/quantity with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// sizes with prices in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
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

    /// Round to the nearest multiple of the quantity step, never below one step.
    ///
    /// An order for zero or a negative size is never produced: anything that
    /// rounds below `step` comes back as exactly `step`.
    pub fn quantize(&self, step: Size) -> Result<Self> {
        let rounded = quantize(self.0, step.0)?;
        Ok(Self(rounded.max(step.0.normalize())))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}
