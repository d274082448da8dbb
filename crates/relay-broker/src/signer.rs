//! HMAC-SHA256 request signing.
//!
//! The signature covers `timestamp + api_key + recv_window + payload`, where
//! the payload is the canonical query string for reads and the compact JSON
//! body for writes. The hex digest travels in headers next to the inputs the
//! exchange needs to recompute it.

use crate::error::{BrokerError, BrokerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_API_KEY: &str = "X-BAPI-API-KEY";
pub const HEADER_SIGN: &str = "X-BAPI-SIGN";
pub const HEADER_TIMESTAMP: &str = "X-BAPI-TIMESTAMP";
pub const HEADER_RECV_WINDOW: &str = "X-BAPI-RECV-WINDOW";
pub const HEADER_SIGN_TYPE: &str = "X-BAPI-SIGN-TYPE";

/// Signature type marker for HMAC-SHA256.
const SIGN_TYPE_HMAC: &str = "2";

/// API key pair.
///
/// Never log the secret.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
        }
    }

    /// Load from environment variables, trimming surrounding whitespace.
    pub fn from_env(key_var: &str, secret_var: &str) -> BrokerResult<Self> {
        let api_key = std::env::var(key_var)
            .map_err(|_| BrokerError::Signing(format!("{key_var} is not set")))?;
        let api_secret = std::env::var(secret_var)
            .map_err(|_| BrokerError::Signing(format!("{secret_var} is not set")))?;
        Ok(Self::new(api_key.trim(), api_secret.trim()))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Canonical query string: keys sorted, `None` values dropped, `&`-joined.
///
/// The same string is signed and sent, so both sides hash identical bytes.
pub fn canonical_query(params: &[(&str, Option<String>)]) -> String {
    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
        .collect();
    pairs.sort_unstable();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signs requests with the account's API secret.
pub struct RequestSigner {
    credentials: Credentials,
    recv_window_ms: u64,
}

impl RequestSigner {
    pub fn new(credentials: Credentials, recv_window_ms: u64) -> Self {
        Self {
            credentials,
            recv_window_ms,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    pub fn recv_window_ms(&self) -> u64 {
        self.recv_window_ms
    }

    /// Hex HMAC-SHA256 over `timestamp + api_key + recv_window + payload`.
    ///
    /// Deterministic for fixed inputs.
    pub fn sign(&self, timestamp_ms: i64, payload: &str) -> BrokerResult<String> {
        let message = format!(
            "{timestamp_ms}{}{}{payload}",
            self.credentials.api_key, self.recv_window_ms
        );

        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| BrokerError::Signing(format!("HMAC init failed: {e}")))?;
        mac.update(message.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Authentication headers for one signed request.
    pub fn auth_headers(
        &self,
        timestamp_ms: i64,
        payload: &str,
    ) -> BrokerResult<Vec<(&'static str, String)>> {
        let signature = self.sign(timestamp_ms, payload)?;

        Ok(vec![
            (HEADER_API_KEY, self.credentials.api_key.clone()),
            (HEADER_SIGN, signature),
            (HEADER_TIMESTAMP, timestamp_ms.to_string()),
            (HEADER_RECV_WINDOW, self.recv_window_ms.to_string()),
            (HEADER_SIGN_TYPE, SIGN_TYPE_HMAC.to_string()),
        ])
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("credentials", &self.credentials)
            .field("recv_window_ms", &self.recv_window_ms)
            .finish()
    }
}
