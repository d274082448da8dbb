//! Order-related types.
//!
//! Provides order side, type, time-in-force and TP/SL options together with
//! the exchange-agnostic `OrderSubmission` the executor hands to a broker.
//! Serialized names match the exchange wire values.

use crate::decimal::{Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Limit order at the instruction's entry price.
    Limit,
    /// Market order, no price is sent.
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "Limit"),
            Self::Market => write!(f, "Market"),
        }
    }
}

/// Time-in-force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled.
    #[default]
    #[serde(rename = "GTC", alias = "gtc", alias = "Gtc")]
    GoodTilCancelled,
    /// Immediate-or-cancel.
    #[serde(rename = "IOC", alias = "ioc", alias = "Ioc")]
    ImmediateOrCancel,
    /// Fill-or-kill.
    #[serde(rename = "FOK", alias = "fok", alias = "Fok")]
    FillOrKill,
    /// Maker only.
    #[serde(rename = "PostOnly")]
    PostOnly,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoodTilCancelled => write!(f, "GTC"),
            Self::ImmediateOrCancel => write!(f, "IOC"),
            Self::FillOrKill => write!(f, "FOK"),
            Self::PostOnly => write!(f, "PostOnly"),
        }
    }
}

/// Price reference that fires take-profit and stop-loss triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriggerBy {
    #[default]
    MarkPrice,
    LastPrice,
    IndexPrice,
}

impl fmt::Display for TriggerBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkPrice => write!(f, "MarkPrice"),
            Self::LastPrice => write!(f, "LastPrice"),
            Self::IndexPrice => write!(f, "IndexPrice"),
        }
    }
}

/// Whether TP/SL close the whole position or only part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TpSlMode {
    #[default]
    Full,
    Partial,
}

/// An order ready for submission, with price and size already on the
/// instrument's grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSubmission {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: Size,
    /// `None` for market orders.
    pub price: Option<Price>,
    pub take_profit: Option<Price>,
    pub stop_loss: Option<Price>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub tpsl_mode: TpSlMode,
    /// Trigger reference applied to both take-profit and stop-loss.
    pub trigger_by: TriggerBy,
}
