//! Prometheus metrics for the trade pipeline.
//!
//! Counters register with the default registry on first use.
//!
//! # Panics
//!
//! First use panics if a metric name is already registered.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_counter, CounterVec, IntCounter};

/// Instructions accepted into the trade queue.
pub static INSTRUCTIONS_ENQUEUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "relay_instructions_enqueued_total",
        "Total trading instructions enqueued"
    )
    .unwrap()
});

/// Orders acknowledged by the exchange.
pub static ORDERS_ACCEPTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_orders_accepted_total",
        "Total orders accepted by the exchange",
        &["symbol", "side"]
    )
    .unwrap()
});

/// Instructions that failed somewhere in the handler.
pub static INSTRUCTIONS_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_instructions_failed_total",
        "Total trading instructions that failed to produce an order",
        &["symbol"]
    )
    .unwrap()
});

/// Best-effort account preparation calls that failed.
pub static ACCOUNT_PREP_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_account_prep_failed_total",
        "Total failed leverage / margin mode calls",
        &["step"]
    )
    .unwrap()
});

/// Clock synchronizations against exchange server time.
pub static TIME_SYNC_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_time_sync_total",
        "Total exchange time synchronizations",
        &["outcome"]
    )
    .unwrap()
});

/// Request retries by reason.
pub static REQUEST_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_request_retries_total",
        "Total REST request retries",
        &["reason"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn instruction_enqueued() {
        INSTRUCTIONS_ENQUEUED_TOTAL.inc();
    }

    pub fn order_accepted(symbol: &str, side: &str) {
        ORDERS_ACCEPTED_TOTAL
            .with_label_values(&[symbol, side])
            .inc();
    }

    pub fn instruction_failed(symbol: &str) {
        INSTRUCTIONS_FAILED_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// `step` is `set_leverage` or `switch_isolated`.
    pub fn account_prep_failed(step: &str) {
        ACCOUNT_PREP_FAILED_TOTAL.with_label_values(&[step]).inc();
    }

    /// `outcome` is `ok` or `failed`.
    pub fn time_sync(outcome: &str) {
        TIME_SYNC_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// `reason` is `clock_skew` or `transport`.
    pub fn request_retry(reason: &str) {
        REQUEST_RETRIES_TOTAL.with_label_values(&[reason]).inc();
    }
}
