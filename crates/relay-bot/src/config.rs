//! Application configuration.
//!
//! Loaded from TOML. API credentials never live in the file; they come from
//! `BYBIT_API_KEY` / `BYBIT_API_SECRET` (a `.env` file is honoured by the
//! binaries).

use crate::error::{AppError, AppResult};
use relay_broker::{BrokerConfig, Credentials};
use relay_executor::{ExecutionConfig, OrderDefaults, RiskConfig};
use serde::{Deserialize, Serialize};

/// Config path used when neither `--config` nor `RELAY_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "RELAY_CONFIG";
pub const API_KEY_ENV_VAR: &str = "BYBIT_API_KEY";
pub const API_SECRET_ENV_VAR: &str = "BYBIT_API_SECRET";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level when `RUST_LOG` is unset. Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Let HTTP client internals log at debug level. Default: false.
    #[serde(default)]
    pub http_verbose: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            http_verbose: false,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: BrokerConfig,
    #[serde(default)]
    pub orders: OrderDefaults,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Config path: CLI arg > `RELAY_CONFIG` > default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.risk.usdt_per_trade.is_sign_positive() || self.risk.usdt_per_trade.is_zero() {
            return Err(AppError::Config(format!(
                "risk.usdt_per_trade must be positive, got {}",
                self.risk.usdt_per_trade
            )));
        }
        if self.risk.default_leverage == 0 {
            return Err(AppError::Config(
                "risk.default_leverage must be at least 1".to_string(),
            ));
        }
        if self.exchange.recv_window_ms == 0 {
            return Err(AppError::Config(
                "exchange.recv_window_ms must be positive".to_string(),
            ));
        }
        if self.exchange.category.trim().is_empty() {
            return Err(AppError::Config("exchange.category is empty".to_string()));
        }
        Ok(())
    }

    /// Handler settings drawn from `[orders]`, `[risk]` and `[exchange]`.
    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            orders: self.orders.clone(),
            risk: self.risk.clone(),
            switch_isolated: self.exchange.switch_isolated,
        }
    }

    /// API credentials from the environment.
    pub fn credentials() -> AppResult<Credentials> {
        Credentials::from_env(API_KEY_ENV_VAR, API_SECRET_ENV_VAR)
            .map_err(|e| AppError::Config(e.to_string()))
    }
}
