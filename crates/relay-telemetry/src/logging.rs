//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter directive used when `RUST_LOG` is not set.
///
/// HTTP client internals stay at `warn` unless `http_verbose` is enabled.
pub fn default_filter(level: &str, http_verbose: bool) -> String {
    let http_level = if http_verbose { "debug" } else { "warn" };
    format!("{level},relay={level},reqwest={http_level},hyper={http_level},hyper_util={http_level}")
}

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over `level`. Output is JSON when
/// `RUST_ENV=production`, pretty otherwise.
pub fn init_logging(level: &str, http_verbose: bool) -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level, http_verbose)));

    let is_production = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let result = if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(log_level = level, http_verbose, "Logging ready");
    Ok(())
}
