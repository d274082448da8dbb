//! Normalized trading instructions.

use crate::decimal::Price;
use crate::order::OrderSide;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position direction requested by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Exchange side that opens a position in this direction.
    pub fn order_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// A trading instruction extracted from a signal message.
///
/// Produced once by the upstream parser and consumed once by the trade queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingInstruction {
    /// Exchange ticker, e.g. `SOLUSDT`.
    pub symbol: String,
    pub direction: Direction,
    pub entry: Price,
    pub stop: Price,
    pub take: Price,
    /// Overrides the configured default leverage when present.
    #[serde(default)]
    pub leverage: Option<u32>,
}

impl TradingInstruction {
    pub fn new(
        symbol: impl Into<String>,
        direction: Direction,
        entry: Price,
        stop: Price,
        take: Price,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            entry,
            stop,
            take,
            leverage: None,
        }
    }

    #[must_use]
    pub fn with_leverage(mut self, leverage: u32) -> Self {
        self.leverage = Some(leverage);
        self
    }

    /// Leverage override, treating `0` as not set.
    pub fn leverage_override(&self) -> Option<u32> {
        self.leverage.filter(|lev| *lev > 0)
    }
}

impl fmt::Display for TradingInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.symbol)?;
        writeln!(f, "{}", self.direction)?;
        writeln!(f, "entry={}", self.entry)?;
        writeln!(f, "stop={}", self.stop)?;
        writeln!(f, "take={}", self.take)?;
        match self.leverage_override() {
            Some(lev) => write!(f, "lev=x{lev}"),
            None => write!(f, "lev=\u{2014}"),
        }
    }
}
