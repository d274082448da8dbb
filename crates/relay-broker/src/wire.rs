//! Typed request and response bodies for the exchange v5 REST API.
//!
//! Every response is wrapped in the same envelope (`retCode`, `retMsg`,
//! `result`). Numeric values travel as strings in both directions.

use relay_core::{OrderSubmission, TimeInForce, TpSlMode, TriggerBy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BrokerError, BrokerResult};

pub const PATH_SERVER_TIME: &str = "/v5/market/time";
pub const PATH_INSTRUMENTS_INFO: &str = "/v5/market/instruments-info";
pub const PATH_SET_LEVERAGE: &str = "/v5/position/set-leverage";
pub const PATH_SWITCH_ISOLATED: &str = "/v5/position/switch-isolated";
pub const PATH_ORDER_CREATE: &str = "/v5/order/create";

/// Success result code.
pub const RET_OK: i64 = 0;
/// Request timestamp is outside the receive window.
pub const RET_TIMESTAMP_WINDOW: i64 = 10002;
/// Request timestamp expired.
pub const RET_TIMESTAMP_EXPIRED: i64 = 10003;

/// Whether `code` reports a timestamp-window violation.
pub fn is_clock_skew_code(code: i64) -> bool {
    matches!(code, RET_TIMESTAMP_WINDOW | RET_TIMESTAMP_EXPIRED)
}

/// Response envelope shared by all endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Value,
}

impl ApiEnvelope {
    /// Decode `result` into `T`. A missing or null result reads as `{}`.
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> BrokerResult<T> {
        let result = match self.result {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        serde_json::from_value(result).map_err(|e| BrokerError::Decode(e.to_string()))
    }
}

/// A number the exchange may send either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumOrStr {
    Int(i64),
    Float(f64),
    Str(String),
}

impl NumOrStr {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(*v as i64),
            Self::Float(_) => None,
            Self::Str(s) => s.trim().parse::<i64>().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResult {
    pub time_second: Option<NumOrStr>,
    pub time_nano: Option<NumOrStr>,
}

/// `GET /v5/market/time` body. Parsed without the envelope check so that
/// a bare `{"time": ...}` reply is accepted too.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerTimeResponse {
    pub time: Option<NumOrStr>,
    pub result: Option<ServerTimeResult>,
}

impl ServerTimeResponse {
    /// Server time in milliseconds.
    ///
    /// Each field has a fixed unit: top-level `time` is milliseconds,
    /// `result.timeNano` nanoseconds and `result.timeSecond` seconds. The
    /// first positive one in that order wins.
    pub fn server_ms(&self) -> Option<i64> {
        let nested = self.result.as_ref();
        let positive = |v: &NumOrStr| v.as_i64().filter(|v| *v > 0);

        self.time
            .as_ref()
            .and_then(positive)
            .or_else(|| {
                nested
                    .and_then(|r| r.time_nano.as_ref())
                    .and_then(positive)
                    .map(|ns| ns / 1_000_000)
            })
            .or_else(|| {
                nested
                    .and_then(|r| r.time_second.as_ref())
                    .and_then(positive)
                    .and_then(|s| s.checked_mul(1_000))
            })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFilter {
    pub tick_size: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    pub qty_step: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRow {
    pub symbol: String,
    #[serde(default)]
    pub price_filter: PriceFilter,
    #[serde(default)]
    pub lot_size_filter: LotSizeFilter,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstrumentsInfoResult {
    #[serde(default)]
    pub list: Vec<InstrumentRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageRequest<'a> {
    pub category: &'a str,
    pub symbol: &'a str,
    pub buy_leverage: String,
    pub sell_leverage: String,
}

impl<'a> SetLeverageRequest<'a> {
    pub fn new(category: &'a str, symbol: &'a str, leverage: u32) -> Self {
        Self {
            category,
            symbol,
            buy_leverage: leverage.to_string(),
            sell_leverage: leverage.to_string(),
        }
    }
}

/// Trade mode flag for `switch-isolated`: 0 cross, 1 isolated.
pub const TRADE_MODE_ISOLATED: u8 = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchIsolatedRequest<'a> {
    pub category: &'a str,
    pub symbol: &'a str,
    pub trade_mode: u8,
}

/// `POST /v5/order/create` body.
///
/// Take-profit and stop-loss each carry their trigger reference; both fields
/// of a pair are present or absent together.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest<'a> {
    pub category: &'a str,
    pub symbol: &'a str,
    pub side: &'static str,
    pub order_type: String,
    pub qty: String,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub tpsl_mode: TpSlMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_trigger_by: Option<TriggerBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl_trigger_by: Option<TriggerBy>,
}

impl<'a> CreateOrderRequest<'a> {
    pub fn from_submission(category: &'a str, order: &'a OrderSubmission) -> Self {
        let trigger = order.trigger_by;
        Self {
            category,
            symbol: &order.symbol,
            side: order.side.as_str(),
            order_type: order.order_type.to_string(),
            qty: order.qty.to_string(),
            time_in_force: order.time_in_force,
            reduce_only: order.reduce_only,
            tpsl_mode: order.tpsl_mode,
            price: order.price.map(|p| p.to_string()),
            take_profit: order.take_profit.map(|p| p.to_string()),
            tp_trigger_by: order.take_profit.map(|_| trigger),
            stop_loss: order.stop_loss.map(|p| p.to_string()),
            sl_trigger_by: order.stop_loss.map(|_| trigger),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateResult {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

/// Result payload for endpoints whose result carries nothing useful.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmptyResult {}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{OrderSide, OrderType, Price, Size};
    use rust_decimal_macros::dec;

    #[test]
    fn test_server_time_prefers_top_level_time() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"timeSecond":"1688639403","timeNano":"1688639403423213947"},"time":1688639403423}"#;
        let parsed: ServerTimeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.server_ms(), Some(1_688_639_403_423));
    }

    #[test]
    fn test_server_time_nano_and_second_encodings() {
        let nano: ServerTimeResponse =
            serde_json::from_str(r#"{"result":{"timeNano":"1688639403423213947"}}"#).unwrap();
        assert_eq!(nano.server_ms(), Some(1_688_639_403_423));

        let secs: ServerTimeResponse =
            serde_json::from_str(r#"{"result":{"timeSecond":"1688639403"}}"#).unwrap();
        assert_eq!(secs.server_ms(), Some(1_688_639_403_000));

        let empty: ServerTimeResponse = serde_json::from_str(r#"{"result":{}}"#).unwrap();
        assert_eq!(empty.server_ms(), None);
    }

    #[test]
    fn test_server_time_unit_follows_field_not_magnitude() {
        let small: ServerTimeResponse = serde_json::from_str(r#"{"time":1000500}"#).unwrap();
        assert_eq!(small.server_ms(), Some(1_000_500));

        let nano: ServerTimeResponse =
            serde_json::from_str(r#"{"result":{"timeNano":"1000500000000"}}"#).unwrap();
        assert_eq!(nano.server_ms(), Some(1_000_500));

        let secs: ServerTimeResponse =
            serde_json::from_str(r#"{"result":{"timeSecond":1000}}"#).unwrap();
        assert_eq!(secs.server_ms(), Some(1_000_000));
    }

    #[test]
    fn test_server_time_skips_non_positive_fields() {
        let parsed: ServerTimeResponse =
            serde_json::from_str(r#"{"time":0,"result":{"timeSecond":"1688639403"}}"#).unwrap();
        assert_eq!(parsed.server_ms(), Some(1_688_639_403_000));
    }

    #[test]
    fn test_envelope_null_result_reads_as_empty() {
        let env: ApiEnvelope =
            serde_json::from_str(r#"{"retCode":0,"retMsg":"OK","result":null}"#).unwrap();
        let _: EmptyResult = env.into_result().unwrap();

        let env: ApiEnvelope = serde_json::from_str(r#"{"retCode":0}"#).unwrap();
        let info: InstrumentsInfoResult = env.into_result().unwrap();
        assert!(info.list.is_empty());
    }

    #[test]
    fn test_instrument_row_parsing() {
        let body = r#"{"list":[{"symbol":"SOLUSDT","priceFilter":{"tickSize":"0.01"},"lotSizeFilter":{"qtyStep":"0.1","minOrderQty":"0.1"}}]}"#;
        let info: InstrumentsInfoResult = serde_json::from_str(body).unwrap();
        let row = &info.list[0];
        assert_eq!(row.price_filter.tick_size.as_deref(), Some("0.01"));
        assert_eq!(row.lot_size_filter.qty_step.as_deref(), Some("0.1"));
    }

    #[test]
    fn test_set_leverage_body() {
        let body = serde_json::to_string(&SetLeverageRequest::new("linear", "SOLUSDT", 20)).unwrap();
        assert_eq!(
            body,
            r#"{"category":"linear","symbol":"SOLUSDT","buyLeverage":"20","sellLeverage":"20"}"#
        );
    }

    #[test]
    fn test_create_order_body_pairs_triggers() {
        let order = OrderSubmission {
            symbol: "SOLUSDT".to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Limit,
            qty: Size::new(dec!(13.3)),
            price: Some(Price::new(dec!(150))),
            take_profit: Some(Price::new(dec!(140))),
            stop_loss: None,
            time_in_force: TimeInForce::GoodTilCancelled,
            reduce_only: false,
            tpsl_mode: TpSlMode::Full,
            trigger_by: TriggerBy::MarkPrice,
        };

        let body = serde_json::to_value(CreateOrderRequest::from_submission("linear", &order)).unwrap();
        assert_eq!(body["side"], "Sell");
        assert_eq!(body["orderType"], "Limit");
        assert_eq!(body["qty"], "13.3");
        assert_eq!(body["price"], "150");
        assert_eq!(body["timeInForce"], "GTC");
        assert_eq!(body["tpslMode"], "Full");
        assert_eq!(body["reduceOnly"], false);
        assert_eq!(body["takeProfit"], "140");
        assert_eq!(body["tpTriggerBy"], "MarkPrice");
        assert!(body.get("stopLoss").is_none());
        assert!(body.get("slTriggerBy").is_none());
    }

    #[test]
    fn test_market_order_omits_price() {
        let order = OrderSubmission {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            qty: Size::new(dec!(0.001)),
            price: None,
            take_profit: None,
            stop_loss: None,
            time_in_force: TimeInForce::ImmediateOrCancel,
            reduce_only: true,
            tpsl_mode: TpSlMode::Partial,
            trigger_by: TriggerBy::LastPrice,
        };

        let body = serde_json::to_value(CreateOrderRequest::from_submission("linear", &order)).unwrap();
        assert!(body.get("price").is_none());
        assert_eq!(body["orderType"], "Market");
        assert_eq!(body["reduceOnly"], true);
        assert_eq!(body["timeInForce"], "IOC");
    }
}
