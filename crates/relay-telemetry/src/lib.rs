//! Prometheus metrics and structured logging for the signal relay.
//!
//! - Structured logging with tracing (pretty for development, JSON in production)
//! - Prometheus counters for the trade pipeline stages

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{default_filter, init_logging};
pub use metrics::Metrics;
