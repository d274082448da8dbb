//! Execution settings: order defaults and per-trade risk.

use relay_core::{TimeInForce, TpSlMode, TriggerBy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How entry orders are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderDefaults {
    /// Enter at market instead of a limit at the instruction's entry price.
    pub market_entry: bool,
    pub time_in_force: TimeInForce,
    /// Price reference for take-profit and stop-loss triggers.
    pub tpsl_trigger: TriggerBy,
    pub tpsl_mode: TpSlMode,
}

impl Default for OrderDefaults {
    fn default() -> Self {
        Self {
            market_entry: false,
            time_in_force: TimeInForce::GoodTilCancelled,
            tpsl_trigger: TriggerBy::MarkPrice,
            tpsl_mode: TpSlMode::Full,
        }
    }
}

/// Capital at risk per instruction and queue concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Margin committed per trade, in USDT.
    pub usdt_per_trade: Decimal,
    /// Leverage when the instruction carries none.
    pub default_leverage: u32,
    /// Instruction handlers allowed in flight at once.
    pub max_concurrent: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            usdt_per_trade: Decimal::ONE_HUNDRED,
            default_leverage: 20,
            max_concurrent: 1,
        }
    }
}

/// Everything the instruction handler needs besides the broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionConfig {
    pub orders: OrderDefaults,
    pub risk: RiskConfig,
    /// Switch the symbol to isolated margin before each order.
    pub switch_isolated: bool,
}

impl ExecutionConfig {
    /// Concurrency limit, at least one.
    pub fn permits(&self) -> usize {
        self.risk.max_concurrent.max(1)
    }
}
