//! Core domain types for the signal relay trade pipeline.
//!
//! This crate provides the types shared by the broker and the executor:
//! - `Price`, `Size`: Precision-safe numeric types with step quantization
//! - `normalize_number`: Locale-tolerant numeric text parsing
//! - `TradingInstruction`: A normalized trading instruction awaiting execution
//! - `OrderSubmission`: The exchange-agnostic order built from an instruction
//! - `Direction`, `OrderSide`, `OrderType`, `TimeInForce`: Trading enums

pub mod decimal;
pub mod error;
pub mod instruction;
pub mod number;
pub mod order;

pub use decimal::{quantize, Price, Size};
pub use error::{CoreError, Result};
pub use instruction::{Direction, TradingInstruction};
pub use number::normalize_number;
pub use order::{OrderSide, OrderSubmission, OrderType, TimeInForce, TpSlMode, TriggerBy};
