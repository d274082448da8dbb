//! Trade execution for the signal relay.
//!
//! Turns normalized trading instructions into exchange orders, one handler
//! per instruction, behind a single-consumer FIFO queue.
//!
//! # Key Components
//!
//! - [`TradeQueue`]: Unbounded FIFO, consumer task and start/stop lifecycle
//! - [`InstructionHandler`]: Account preparation, sizing, quantization, submission
//! - [`ExecutionConfig`]: Order defaults and per-trade risk
//!
//! # Handler sequence
//!
//! 1. Effective leverage (instruction override, else default)
//! 2. Set leverage / switch to isolated margin (failures only warn)
//! 3. Raw quantity = usdt_per_trade * leverage / entry
//! 4. Quantize entry (omitted for market entry), take-profit and stop-loss
//! 5. Submit the order and log the exchange order id

pub mod config;
pub mod error;
pub mod handler;
pub mod queue;
pub mod sizing;

#[cfg(test)]
mod testing;

pub use config::{ExecutionConfig, OrderDefaults, RiskConfig};
pub use error::{ExecutorError, ExecutorResult};
pub use handler::InstructionHandler;
pub use queue::{QueueStats, TradeQueue};
pub use sizing::{raw_quantity, MIN_ENTRY_PRICE};
