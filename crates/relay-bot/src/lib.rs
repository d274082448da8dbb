//! Signal relay trade pipeline.
//!
//! Main application that orchestrates the components:
//! - Configuration (TOML file + environment credentials)
//! - Bybit v5 broker with signed, time-synchronized requests
//! - Trade execution queue
//! - Instruction intake from newline-delimited JSON

pub mod app;
pub mod config;
pub mod error;

pub use app::{parse_instruction, Application};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
