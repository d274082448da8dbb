//! HTTP transport seam.
//!
//! `SignedRequestClient` builds fully signed requests and hands them to an
//! `HttpTransport`. This allows for:
//! - Unit testing the retry/resync protocol with a scripted transport
//! - Swapping the HTTP stack without touching signing or retry logic

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;

use crate::error::{BrokerError, BrokerResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A request ready for the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    /// Canonical query string without the leading `?`, possibly empty.
    pub query: String,
    /// Compact JSON body for POST requests.
    pub body: Option<String>,
    pub headers: Vec<(&'static str, String)>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status code and body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Trait for executing HTTP requests.
///
/// Connection-level failures are reported as `BrokerError::Transport`;
/// any response that arrives, whatever its status, is returned as `Ok`.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, BrokerResult<HttpResponse>>;
}

/// Arc wrapper for HttpTransport trait objects.
pub type DynTransport = Arc<dyn HttpTransport>;

/// `reqwest`-backed transport with connect and read timeouts.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, request: &HttpRequest) -> String {
        if request.query.is_empty() {
            format!("{}{}", self.base_url, request.path)
        } else {
            format!("{}{}?{}", self.base_url, request.path, request.query)
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, BrokerResult<HttpResponse>> {
        Box::pin(async move {
            let url = self.url(&request);
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&url),
                HttpMethod::Post => self.client.post(&url),
            };

            builder = builder.header("Content-Type", "application/json");
            for (name, value) in &request.headers {
                builder = builder.header(*name, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| BrokerError::Transport(format!("{} {}: {e}", request.method, request.path)))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| BrokerError::Transport(format!("reading body of {}: {e}", request.path)))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Scripted reply for `MockTransport`.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with this body.
    Json(String),
    /// Arbitrary status and body.
    Status(u16, String),
    /// Connection-level failure.
    TransportError(String),
}

/// Mock transport for testing.
///
/// Replies are queued per path and consumed in order. When a path's queue is
/// empty, its sticky reply (if any) is returned instead.
#[derive(Debug, Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<MockReply>>>,
    sticky: Mutex<HashMap<String, MockReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot reply for `path`.
    pub fn push(&self, path: &str, reply: MockReply) {
        self.queued
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queue a one-shot 200 JSON reply for `path`.
    pub fn push_json(&self, path: &str, body: impl Into<String>) {
        self.push(path, MockReply::Json(body.into()));
    }

    /// Reply used for `path` whenever nothing is queued.
    pub fn set_sticky(&self, path: &str, reply: MockReply) {
        self.sticky.lock().insert(path.to_string(), reply);
    }

    /// Get recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Recorded requests for one path.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    fn next_reply(&self, path: &str) -> Option<MockReply> {
        if let Some(reply) = self.queued.lock().get_mut(path).and_then(VecDeque::pop_front) {
            return Some(reply);
        }
        self.sticky.lock().get(path).cloned()
    }
}

impl HttpTransport for MockTransport {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, BrokerResult<HttpResponse>> {
        Box::pin(async move {
            let path = request.path.clone();
            self.requests.lock().push(request);

            match self.next_reply(&path) {
                Some(MockReply::Json(body)) => Ok(HttpResponse { status: 200, body }),
                Some(MockReply::Status(status, body)) => Ok(HttpResponse { status, body }),
                Some(MockReply::TransportError(msg)) => Err(BrokerError::Transport(msg)),
                None => Err(BrokerError::Transport(format!("no scripted reply for {path}"))),
            }
        })
    }
}
