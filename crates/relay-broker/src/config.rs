//! Exchange connectivity configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const LIVE_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";

/// Exchange configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Use the testnet endpoint. Default: true.
    pub testnet: bool,
    /// Explicit REST base URL; overrides `testnet` when set.
    pub base_url: Option<String>,
    /// Product category (`linear` for USDT perpetuals).
    pub category: String,
    /// Receive window sent with every signed request (ms). Default: 5000.
    pub recv_window_ms: u64,
    /// Total attempts per logical request. Default: 3.
    pub max_retries: u32,
    /// Linear backoff unit between attempts (ms). Default: 500.
    pub retry_backoff_ms: u64,
    /// Periodically resync the clock offset before signed calls. Default: true.
    pub time_sync: bool,
    /// Resync when the last sync is older than this (s). Default: 60.
    pub time_resync_sec: u64,
    /// Switch the symbol to isolated margin before each order. Default: false.
    pub switch_isolated: bool,
    /// Connect and read timeout (s). Default: 10.
    pub timeout_sec: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            testnet: true,
            base_url: None,
            category: "linear".to_string(),
            recv_window_ms: 5000,
            max_retries: 3,
            retry_backoff_ms: 500,
            time_sync: true,
            time_resync_sec: 60,
            switch_isolated: false,
            timeout_sec: 10.0,
        }
    }
}

impl BrokerConfig {
    /// REST base URL for the configured environment.
    pub fn rest_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.testnet => TESTNET_URL.to_string(),
            None => LIVE_URL.to_string(),
        }
    }

    pub fn environment(&self) -> &'static str {
        if self.testnet {
            "TESTNET"
        } else {
            "LIVE"
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_sec.max(0.1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.time_resync_sec)
    }

    /// Attempt budget, at least one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}
