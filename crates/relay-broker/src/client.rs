//! Signed, clock-synchronized, retrying REST client.
//!
//! One logical call runs this protocol:
//! 1. Optionally refresh the clock offset (authenticated calls only)
//! 2. Sign with a fresh timestamp and send
//! 3. Classify the reply as success, retryable or terminal
//! 4. Retryable replies back off linearly and go again until the attempt
//!    budget runs out; a timestamp-window rejection forces one resync first

use std::sync::Arc;
use std::time::Duration;

use relay_telemetry::Metrics;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, ClockOffset};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::signer::{canonical_query, Credentials, RequestSigner};
use crate::transport::{DynTransport, HttpMethod, HttpRequest, HttpResponse};
use crate::wire::{is_clock_skew_code, ApiEnvelope, ServerTimeResponse, PATH_SERVER_TIME, RET_OK};

/// Outcome of a single attempt.
#[derive(Debug)]
enum Attempt<T> {
    Success(T),
    Retryable(BrokerError),
    Terminal(BrokerError),
}

/// Retry and resync knobs, copied out of `BrokerConfig`.
#[derive(Debug, Clone)]
struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    time_sync: bool,
    resync_interval: Duration,
}

impl From<&BrokerConfig> for RetryPolicy {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            backoff: config.retry_backoff(),
            time_sync: config.time_sync,
            resync_interval: config.resync_interval(),
        }
    }
}

/// Authenticated REST client with clock-offset tracking.
pub struct SignedRequestClient {
    transport: DynTransport,
    signer: RequestSigner,
    clock: ClockOffset,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl SignedRequestClient {
    pub fn new(config: &BrokerConfig, credentials: Credentials, transport: DynTransport) -> Self {
        Self {
            transport,
            signer: RequestSigner::new(credentials, config.recv_window_ms),
            clock: ClockOffset::with_system_clock(),
            policy: RetryPolicy::from(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `clock` as the local time source. Resets the offset.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = ClockOffset::new(clock);
        self
    }

    /// Abandon retries and backoff once `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn clock(&self) -> &ClockOffset {
        &self.clock
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Fetch server time once and update the offset.
    ///
    /// No retries: callers on the request path use `resync`, which logs and
    /// swallows failures so the previous offset stays in effect.
    pub async fn sync_time(&self) -> BrokerResult<i64> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            path: PATH_SERVER_TIME.to_string(),
            query: String::new(),
            body: None,
            headers: Vec::new(),
        };

        let response = self.transport.execute(request).await?;
        if !(200..300).contains(&response.status) {
            return Err(BrokerError::Transport(format!(
                "server time returned HTTP {}",
                response.status
            )));
        }

        let parsed: ServerTimeResponse = serde_json::from_str(&response.body)
            .map_err(|e| BrokerError::Decode(format!("server time: {e}")))?;
        let server_ms = parsed.server_ms().ok_or_else(|| {
            BrokerError::Decode(format!("unexpected time payload: {}", response.body))
        })?;

        let offset_ms = self.clock.apply_server_time(server_ms);
        Metrics::time_sync("ok");
        info!(offset_ms, "Exchange time sync");
        Ok(offset_ms)
    }

    async fn resync(&self) {
        if let Err(e) = self.sync_time().await {
            Metrics::time_sync("failed");
            warn!(error = %e, offset_ms = self.clock.offset_ms(), "Exchange time sync failed, keeping previous offset");
        }
    }

    /// GET with a canonical query string. `auth` adds signature headers.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, Option<String>)],
        auth: bool,
        op: &str,
    ) -> BrokerResult<T> {
        let query = canonical_query(params);
        self.call(HttpMethod::Get, path, query, None, auth, op).await
    }

    /// Authenticated POST with a compact JSON body.
    ///
    /// The body is serialized once; the signed bytes and the sent bytes are
    /// the same string.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        op: &str,
    ) -> BrokerResult<T> {
        let body = serde_json::to_string(body)
            .map_err(|e| BrokerError::Decode(format!("encoding {op} body: {e}")))?;
        self.call(HttpMethod::Post, path, String::new(), Some(body), true, op)
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        query: String,
        body: Option<String>,
        auth: bool,
        op: &str,
    ) -> BrokerResult<T> {
        if auth && self.policy.time_sync && self.clock.needs_resync(self.policy.resync_interval) {
            self.resync().await;
        }

        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(BrokerError::Cancelled(op.to_string()));
            }
            attempt += 1;

            let request = self.build_request(method, path, &query, body.as_deref(), auth)?;
            debug!(op, %method, path, attempt, "Sending request");

            let outcome = match self.transport.execute(request).await {
                Ok(response) => classify::<T>(response),
                Err(e) if e.is_retryable() => Attempt::Retryable(e),
                Err(e) => Attempt::Terminal(e),
            };

            let err = match outcome {
                Attempt::Success(value) => return Ok(value),
                Attempt::Terminal(e) => return Err(e),
                Attempt::Retryable(e) => e,
            };

            let reason = match &err {
                BrokerError::ClockSkew { code, message } => {
                    warn!(op, code, message = %message, attempt, "Timestamp window rejected, resyncing");
                    self.resync().await;
                    "clock_skew"
                }
                other => {
                    warn!(op, error = %other, attempt, "Request failed");
                    "transport"
                }
            };

            if attempt >= self.policy.max_attempts {
                return Err(BrokerError::RetriesExhausted {
                    op: op.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            Metrics::request_retry(reason);
            let delay = self.policy.backoff * attempt;
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Err(BrokerError::Cancelled(op.to_string()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &str,
        body: Option<&str>,
        auth: bool,
    ) -> BrokerResult<HttpRequest> {
        let headers = if auth {
            let payload = match method {
                HttpMethod::Get => query,
                HttpMethod::Post => body.unwrap_or("{}"),
            };
            self.signer
                .auth_headers(self.clock.signed_timestamp_ms(), payload)?
        } else {
            Vec::new()
        };

        Ok(HttpRequest {
            method,
            path: path.to_string(),
            query: query.to_string(),
            body: body.map(str::to_string),
            headers,
        })
    }
}

impl std::fmt::Debug for SignedRequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedRequestClient")
            .field("signer", &self.signer)
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn classify<T: DeserializeOwned>(response: HttpResponse) -> Attempt<T> {
    let envelope: ApiEnvelope = match serde_json::from_str(&response.body) {
        Ok(envelope) => envelope,
        Err(_) if response.status >= 500 || response.status == 429 => {
            return Attempt::Retryable(BrokerError::Transport(format!(
                "HTTP {}: {}",
                response.status,
                snippet(&response.body)
            )));
        }
        Err(e) => {
            return Attempt::Terminal(BrokerError::Decode(format!(
                "HTTP {}: {e}: {}",
                response.status,
                snippet(&response.body)
            )));
        }
    };

    match envelope.ret_code {
        RET_OK => match envelope.into_result() {
            Ok(value) => Attempt::Success(value),
            Err(e) => Attempt::Terminal(e),
        },
        code if is_clock_skew_code(code) => Attempt::Retryable(BrokerError::ClockSkew {
            code,
            message: envelope.ret_msg,
        }),
        code => Attempt::Terminal(BrokerError::Exchange {
            code,
            message: if envelope.ret_msg.is_empty() {
                "Exchange error".to_string()
            } else {
                envelope.ret_msg
            },
        }),
    }
}

fn snippet(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::signer::{HEADER_SIGN, HEADER_TIMESTAMP};
    use crate::transport::{MockReply, MockTransport};
    use crate::wire::{EmptyResult, PATH_INSTRUMENTS_INFO, PATH_ORDER_CREATE};

    const LOCAL_MS: i64 = 1_000_000;
    const OK: &str = r#"{"retCode":0,"retMsg":"OK","result":{}}"#;
    const SKEW: &str = r#"{"retCode":10002,"retMsg":"invalid request, please check your server timestamp or recv_window param"}"#;

    fn config(time_sync: bool) -> BrokerConfig {
        BrokerConfig {
            retry_backoff_ms: 1,
            time_sync,
            ..Default::default()
        }
    }

    fn setup(
        config: &BrokerConfig,
    ) -> (Arc<MockTransport>, Arc<ManualClock>, SignedRequestClient) {
        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(ManualClock::new(LOCAL_MS));
        let client = SignedRequestClient::new(
            config,
            Credentials::new("key", "secret"),
            transport.clone(),
        )
        .with_clock(clock.clone());
        (transport, clock, client)
    }

    fn time_reply(server_ms: i64) -> MockReply {
        MockReply::Json(format!(r#"{{"retCode":0,"retMsg":"OK","result":{{}},"time":{server_ms}}}"#))
    }

    fn paths(transport: &MockTransport) -> Vec<String> {
        transport.requests().into_iter().map(|r| r.path).collect()
    }

    #[tokio::test]
    async fn test_sync_time_offset_applied_to_signature() {
        let (transport, _clock, client) = setup(&config(true));
        transport.set_sticky(PATH_SERVER_TIME, time_reply(1_000_500));
        transport.push_json(PATH_ORDER_CREATE, OK);

        let _: EmptyResult = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({"a": 1}), "place_order")
            .await
            .unwrap();

        assert_eq!(client.clock().offset_ms(), 500);
        let sent = transport.requests_to(PATH_ORDER_CREATE);
        assert_eq!(sent[0].header(HEADER_TIMESTAMP), Some("1000500"));
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn test_skew_forces_single_resync_before_retry() {
        let (transport, _clock, client) = setup(&config(false));
        transport.set_sticky(PATH_SERVER_TIME, time_reply(LOCAL_MS + 2_000));
        transport.push_json(PATH_ORDER_CREATE, SKEW);
        transport.push_json(PATH_ORDER_CREATE, OK);

        let _: EmptyResult = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await
            .unwrap();

        assert_eq!(
            paths(&transport),
            vec![PATH_ORDER_CREATE, PATH_SERVER_TIME, PATH_ORDER_CREATE]
        );
        let sent = transport.requests_to(PATH_ORDER_CREATE);
        assert_eq!(sent[0].header(HEADER_TIMESTAMP), Some("1000000"));
        assert_eq!(sent[1].header(HEADER_TIMESTAMP), Some("1002000"));
        assert_ne!(sent[0].header(HEADER_SIGN), sent[1].header(HEADER_SIGN));
    }

    #[tokio::test]
    async fn test_expired_timestamp_forces_single_resync_before_retry() {
        let (transport, _clock, client) = setup(&config(false));
        transport.set_sticky(PATH_SERVER_TIME, time_reply(LOCAL_MS + 700));
        transport.push_json(
            PATH_ORDER_CREATE,
            r#"{"retCode":10003,"retMsg":"request expired"}"#,
        );
        transport.push_json(PATH_ORDER_CREATE, OK);

        let _: EmptyResult = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await
            .unwrap();

        assert_eq!(transport.count(PATH_ORDER_CREATE), 2);
        assert_eq!(transport.count(PATH_SERVER_TIME), 1);
        assert_eq!(client.clock().offset_ms(), 700);
        let sent = transport.requests_to(PATH_ORDER_CREATE);
        assert_eq!(sent[1].header(HEADER_TIMESTAMP), Some("1000700"));
    }

    #[tokio::test]
    async fn test_skew_exhausts_budget() {
        let (transport, _clock, client) = setup(&config(false));
        transport.set_sticky(PATH_SERVER_TIME, time_reply(LOCAL_MS));
        transport.set_sticky(PATH_ORDER_CREATE, MockReply::Json(SKEW.to_string()));

        let result: BrokerResult<EmptyResult> = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await;

        match result {
            Err(BrokerError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, BrokerError::ClockSkew { code: 10002, .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(transport.count(PATH_ORDER_CREATE), 3);
        assert_eq!(transport.count(PATH_SERVER_TIME), 3);
    }

    #[tokio::test]
    async fn test_other_codes_are_terminal() {
        let (transport, _clock, client) = setup(&config(false));
        transport.set_sticky(
            PATH_ORDER_CREATE,
            MockReply::Json(r#"{"retCode":110007,"retMsg":"ab not enough for new order"}"#.to_string()),
        );

        let result: BrokerResult<EmptyResult> = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, BrokerError::Exchange { code: 110007, .. }));
        assert_eq!(err.to_string(), "ab not enough for new order (ErrCode: 110007)");
        assert_eq!(transport.count(PATH_ORDER_CREATE), 1);
        assert_eq!(transport.count(PATH_SERVER_TIME), 0);
    }

    #[tokio::test]
    async fn test_transport_errors_retried() {
        let (transport, _clock, client) = setup(&config(false));
        transport.push(PATH_ORDER_CREATE, MockReply::TransportError("timed out".to_string()));
        transport.push(PATH_ORDER_CREATE, MockReply::Status(502, "<html>bad gateway</html>".to_string()));
        transport.push_json(PATH_ORDER_CREATE, OK);

        let _: EmptyResult = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await
            .unwrap();

        assert_eq!(transport.count(PATH_ORDER_CREATE), 3);
        assert_eq!(transport.count(PATH_SERVER_TIME), 0);
    }

    #[tokio::test]
    async fn test_transport_errors_exhaust_budget() {
        let (transport, _clock, client) = setup(&config(false));
        transport.set_sticky(PATH_ORDER_CREATE, MockReply::TransportError("refused".to_string()));

        let result: BrokerResult<EmptyResult> = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await;

        assert!(matches!(
            result,
            Err(BrokerError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(transport.count(PATH_ORDER_CREATE), 3);
    }

    #[tokio::test]
    async fn test_non_json_client_error_is_terminal() {
        let (transport, _clock, client) = setup(&config(false));
        transport.set_sticky(PATH_ORDER_CREATE, MockReply::Status(403, "forbidden".to_string()));

        let result: BrokerResult<EmptyResult> = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await;

        assert!(matches!(result, Err(BrokerError::Decode(_))));
        assert_eq!(transport.count(PATH_ORDER_CREATE), 1);
    }

    #[tokio::test]
    async fn test_unauthenticated_get_has_no_signature() {
        let (transport, _clock, client) = setup(&config(true));
        transport.push_json(PATH_INSTRUMENTS_INFO, r#"{"retCode":0,"result":{"list":[]}}"#);

        let _: serde_json::Value = client
            .get(
                PATH_INSTRUMENTS_INFO,
                &[
                    ("symbol", Some("SOLUSDT".to_string())),
                    ("category", Some("linear".to_string())),
                ],
                false,
                "instruments-info",
            )
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.query, "category=linear&symbol=SOLUSDT");
        assert!(sent.headers.is_empty());
        // Periodic resync only runs ahead of authenticated calls.
        assert_eq!(transport.count(PATH_SERVER_TIME), 0);
    }

    #[tokio::test]
    async fn test_periodic_resync_interval() {
        let (transport, clock, client) = setup(&config(true));
        transport.set_sticky(PATH_SERVER_TIME, time_reply(LOCAL_MS));
        transport.set_sticky(PATH_ORDER_CREATE, MockReply::Json(OK.to_string()));

        for _ in 0..3 {
            let _: EmptyResult = client
                .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
                .await
                .unwrap();
        }
        assert_eq!(transport.count(PATH_SERVER_TIME), 1);

        clock.advance(61_000);
        let _: EmptyResult = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await
            .unwrap();
        assert_eq!(transport.count(PATH_SERVER_TIME), 2);
    }

    #[tokio::test]
    async fn test_sync_failure_is_swallowed() {
        let (transport, _clock, client) = setup(&config(true));
        transport.set_sticky(PATH_SERVER_TIME, MockReply::TransportError("dns".to_string()));
        transport.push_json(PATH_ORDER_CREATE, OK);

        let _: EmptyResult = client
            .post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order")
            .await
            .unwrap();

        assert_eq!(client.clock().offset_ms(), 0);
        assert_eq!(transport.count(PATH_ORDER_CREATE), 1);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_backoff() {
        let cfg = BrokerConfig {
            retry_backoff_ms: 60_000,
            time_sync: false,
            ..Default::default()
        };
        let token = CancellationToken::new();
        let (transport, _clock, client) = setup(&cfg);
        let client = client.with_shutdown(token.clone());
        transport.set_sticky(PATH_ORDER_CREATE, MockReply::TransportError("refused".to_string()));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result: BrokerResult<EmptyResult> = tokio::time::timeout(
            Duration::from_secs(5),
            client.post(PATH_ORDER_CREATE, &serde_json::json!({}), "place_order"),
        )
        .await
        .unwrap();

        canceller.await.unwrap();
        assert!(matches!(result, Err(BrokerError::Cancelled(_))));
        assert_eq!(transport.count(PATH_ORDER_CREATE), 1);
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).len(), 200);
        assert_eq!(snippet("short"), "short");
    }
}
