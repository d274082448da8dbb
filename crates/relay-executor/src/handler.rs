//! Per-instruction execution: account preparation, sizing, quantization
//! and order submission.

use relay_broker::{DynBroker, OrderAck};
use relay_core::{OrderSubmission, OrderType, TradingInstruction};
use relay_telemetry::Metrics;
use tracing::{info, warn};

use crate::config::ExecutionConfig;
use crate::error::{ExecutorError, ExecutorResult};
use crate::sizing::raw_quantity;

/// Turns one instruction into one order.
pub struct InstructionHandler {
    broker: DynBroker,
    config: ExecutionConfig,
}

impl InstructionHandler {
    pub fn new(broker: DynBroker, config: ExecutionConfig) -> Self {
        Self { broker, config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run the full sequence for `instruction` and return the exchange ack.
    ///
    /// Leverage and margin-mode failures are logged and skipped. Everything
    /// else propagates.
    pub async fn execute(&self, instruction: &TradingInstruction) -> ExecutorResult<OrderAck> {
        let symbol = instruction.symbol.as_str();
        let leverage = instruction
            .leverage_override()
            .unwrap_or(self.config.risk.default_leverage);
        if leverage == 0 {
            return Err(ExecutorError::InvalidInstruction(format!(
                "{symbol}: leverage must be at least 1"
            )));
        }

        self.prepare_account(symbol, leverage).await;

        let raw_qty = raw_quantity(self.config.risk.usdt_per_trade, leverage, instruction.entry)?;

        let orders = &self.config.orders;
        let entry = if orders.market_entry {
            None
        } else {
            Some(instruction.entry)
        };

        let (price, qty) = self
            .broker
            .quantize_price_qty(symbol, entry, raw_qty)
            .await?;
        let (take_profit, _) = self
            .broker
            .quantize_price_qty(symbol, Some(instruction.take), qty)
            .await?;
        let (stop_loss, _) = self
            .broker
            .quantize_price_qty(symbol, Some(instruction.stop), qty)
            .await?;

        let order = OrderSubmission {
            symbol: symbol.to_string(),
            side: instruction.direction.order_side(),
            order_type: if orders.market_entry {
                OrderType::Market
            } else {
                OrderType::Limit
            },
            qty,
            price,
            take_profit,
            stop_loss,
            time_in_force: orders.time_in_force,
            reduce_only: false,
            tpsl_mode: orders.tpsl_mode,
            trigger_by: orders.tpsl_trigger,
        };

        info!(
            symbol,
            side = %order.side,
            qty = %order.qty,
            price = %order.price.map_or_else(|| "MARKET".to_string(), |p| p.to_string()),
            sl = ?order.stop_loss.map(|p| p.to_string()),
            tp = ?order.take_profit.map(|p| p.to_string()),
            leverage,
            tif = %order.time_in_force,
            market_entry = orders.market_entry,
            "Submitting order"
        );

        Ok(self.broker.place_order(order).await?)
    }

    async fn prepare_account(&self, symbol: &str, leverage: u32) {
        if let Err(e) = self.broker.set_leverage(symbol, leverage).await {
            Metrics::account_prep_failed("set_leverage");
            warn!(symbol, leverage, error = %e, "set_leverage failed, continuing");
        }

        if self.config.switch_isolated {
            if let Err(e) = self.broker.switch_isolated(symbol).await {
                Metrics::account_prep_failed("switch_isolated");
                warn!(symbol, error = %e, "switch_isolated failed, continuing");
            }
        }
    }
}

impl std::fmt::Debug for InstructionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
