//! Instrument metadata cache.
//!
//! Tick size and quantity step are resolved once per symbol through the
//! public instruments endpoint and kept for the lifetime of the process.

use std::str::FromStr;

use dashmap::DashMap;
use relay_core::{CoreError, Price, Size};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::client::SignedRequestClient;
use crate::error::{BrokerError, BrokerResult};
use crate::wire::{InstrumentRow, InstrumentsInfoResult, PATH_INSTRUMENTS_INFO};

/// Tick size used when the price filter omits it.
pub const DEFAULT_TICK_SIZE: &str = "0.0001";
/// Quantity step used when the lot size filter omits it.
pub const DEFAULT_QTY_STEP: &str = "0.001";

/// Rounding constraints for one instrument. Both values are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentSpec {
    pub tick_size: Price,
    pub qty_step: Size,
}

impl InstrumentSpec {
    pub fn new(tick_size: Price, qty_step: Size) -> BrokerResult<Self> {
        if !tick_size.is_positive() {
            return Err(CoreError::InvalidStep(format!("tick size {tick_size}")).into());
        }
        if !qty_step.is_positive() {
            return Err(CoreError::InvalidStep(format!("qty step {qty_step}")).into());
        }
        Ok(Self { tick_size, qty_step })
    }

    /// Build from an instruments-info row, falling back to the defaults for
    /// missing filter fields.
    pub fn from_row(row: &InstrumentRow) -> BrokerResult<Self> {
        let tick = filter_value(row.price_filter.tick_size.as_deref(), DEFAULT_TICK_SIZE, "tickSize")?;
        let step = filter_value(row.lot_size_filter.qty_step.as_deref(), DEFAULT_QTY_STEP, "qtyStep")?;
        Self::new(Price::new(tick), Size::new(step))
    }
}

fn filter_value(raw: Option<&str>, default: &str, field: &str) -> BrokerResult<Decimal> {
    let text = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => default,
    };
    Decimal::from_str(text).map_err(|e| BrokerError::Decode(format!("{field}={text:?}: {e}")))
}

/// Symbol to `InstrumentSpec` cache.
///
/// Concurrent misses for the same symbol may both fetch; the second insert
/// overwrites the first with an identical value.
#[derive(Debug)]
pub struct InstrumentCache {
    specs: DashMap<String, InstrumentSpec>,
    category: String,
}

impl InstrumentCache {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            specs: DashMap::new(),
            category: category.into(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<InstrumentSpec> {
        self.specs.get(symbol).map(|entry| *entry)
    }

    pub fn insert(&self, symbol: impl Into<String>, spec: InstrumentSpec) {
        self.specs.insert(symbol.into(), spec);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Cached spec for `symbol`, fetching it on a miss.
    ///
    /// # Errors
    /// - `NoInstrument` if the exchange returns no rows for the symbol
    /// - Whatever the client returns for the lookup itself
    pub async fn resolve(
        &self,
        client: &SignedRequestClient,
        symbol: &str,
    ) -> BrokerResult<InstrumentSpec> {
        if let Some(spec) = self.get(symbol) {
            return Ok(spec);
        }

        let info: InstrumentsInfoResult = client
            .get(
                PATH_INSTRUMENTS_INFO,
                &[
                    ("category", Some(self.category.clone())),
                    ("symbol", Some(symbol.to_string())),
                ],
                false,
                "instruments-info",
            )
            .await?;

        let row = info
            .list
            .iter()
            .find(|row| row.symbol == symbol)
            .or_else(|| info.list.first())
            .ok_or_else(|| BrokerError::NoInstrument(symbol.to_string()))?;

        let spec = InstrumentSpec::from_row(row)?;
        self.insert(symbol, spec);
        info!(
            symbol,
            tick_size = %spec.tick_size,
            qty_step = %spec.qty_step,
            "Instrument spec cached"
        );
        debug!(cached = self.len(), "Instrument cache size");
        Ok(spec)
    }
}
