//! Broker trait and the Bybit v5 implementation.
//!
//! The executor only sees the `Broker` trait. This allows for:
//! - Dependency injection for testing
//! - Keeping the queue free of any exchange wire details

use std::sync::Arc;

use relay_core::{OrderSubmission, Price, Size};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::SignedRequestClient;
use crate::config::BrokerConfig;
use crate::error::BrokerResult;
use crate::instruments::InstrumentCache;
use crate::signer::Credentials;
use crate::transport::{BoxFuture, ReqwestTransport};
use crate::wire::{
    CreateOrderRequest, EmptyResult, OrderCreateResult, SetLeverageRequest, SwitchIsolatedRequest,
    PATH_ORDER_CREATE, PATH_SET_LEVERAGE, PATH_SWITCH_ISOLATED, TRADE_MODE_ISOLATED,
};

/// Exchange acknowledgement for a created order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: String,
    pub order_link_id: String,
}

/// Operations the trade queue needs from an exchange.
pub trait Broker: Send + Sync {
    /// Set buy and sell leverage for `symbol`.
    fn set_leverage<'a>(&'a self, symbol: &'a str, leverage: u32) -> BoxFuture<'a, BrokerResult<()>>;

    /// Switch `symbol` to isolated margin.
    fn switch_isolated<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, BrokerResult<()>>;

    /// Snap price and quantity to the instrument grid.
    ///
    /// `None` prices pass through. The quantity is never below one step.
    fn quantize_price_qty<'a>(
        &'a self,
        symbol: &'a str,
        price: Option<Price>,
        qty: Size,
    ) -> BoxFuture<'a, BrokerResult<(Option<Price>, Size)>>;

    /// Submit one order and return the exchange identifiers.
    fn place_order(&self, order: OrderSubmission) -> BoxFuture<'_, BrokerResult<OrderAck>>;
}

/// Arc wrapper for Broker trait objects.
pub type DynBroker = Arc<dyn Broker>;

/// Bybit v5 unified-account broker.
#[derive(Debug)]
pub struct BybitBroker {
    client: SignedRequestClient,
    instruments: InstrumentCache,
    category: String,
}

impl BybitBroker {
    /// Broker over an existing client.
    pub fn new(config: &BrokerConfig, client: SignedRequestClient) -> Self {
        Self {
            client,
            instruments: InstrumentCache::new(config.category.clone()),
            category: config.category.clone(),
        }
    }

    /// Broker over HTTPS to the configured environment.
    ///
    /// `shutdown` stops in-flight retries once cancelled.
    pub fn connect(
        config: &BrokerConfig,
        credentials: Credentials,
        shutdown: CancellationToken,
    ) -> BrokerResult<Self> {
        let transport = ReqwestTransport::new(config.rest_url(), config.timeout())?;
        let client = SignedRequestClient::new(config, credentials, Arc::new(transport))
            .with_shutdown(shutdown);

        info!(
            env = config.environment(),
            category = %config.category,
            base_url = %config.rest_url(),
            "Broker=Bybit v5 ready"
        );
        Ok(Self::new(config, client))
    }

    pub fn client(&self) -> &SignedRequestClient {
        &self.client
    }

    pub fn instruments(&self) -> &InstrumentCache {
        &self.instruments
    }
}

impl Broker for BybitBroker {
    fn set_leverage<'a>(&'a self, symbol: &'a str, leverage: u32) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            let body = SetLeverageRequest::new(&self.category, symbol, leverage);
            let _: EmptyResult = self.client.post(PATH_SET_LEVERAGE, &body, "set_leverage").await?;
            Ok(())
        })
    }

    fn switch_isolated<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            let body = SwitchIsolatedRequest {
                category: &self.category,
                symbol,
                trade_mode: TRADE_MODE_ISOLATED,
            };
            let _: EmptyResult = self
                .client
                .post(PATH_SWITCH_ISOLATED, &body, "switch_isolated")
                .await?;
            Ok(())
        })
    }

    fn quantize_price_qty<'a>(
        &'a self,
        symbol: &'a str,
        price: Option<Price>,
        qty: Size,
    ) -> BoxFuture<'a, BrokerResult<(Option<Price>, Size)>> {
        Box::pin(async move {
            let spec = self.instruments.resolve(&self.client, symbol).await?;
            let price = price.map(|p| p.quantize(spec.tick_size)).transpose()?;
            let qty = qty.quantize(spec.qty_step)?;
            Ok((price, qty))
        })
    }

    fn place_order(&self, order: OrderSubmission) -> BoxFuture<'_, BrokerResult<OrderAck>> {
        Box::pin(async move {
            let body = CreateOrderRequest::from_submission(&self.category, &order);
            let result: OrderCreateResult =
                self.client.post(PATH_ORDER_CREATE, &body, "place_order").await?;
            Ok(OrderAck {
                order_id: result.order_id,
                order_link_id: result.order_link_id,
            })
        })
    }
}
