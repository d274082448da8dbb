//! Exchange connectivity for the signal relay.
//!
//! Signed, clock-synchronized, retrying REST calls against the Bybit v5 API.
//!
//! # Key Components
//!
//! - [`SignedRequestClient`]: Clock offset, signing and the retry/resync protocol
//! - [`ClockOffset`]: Shared `server - local` offset published as one sample
//! - [`RequestSigner`]: HMAC-SHA256 request signatures
//! - [`InstrumentCache`]: Per-symbol tick size and quantity step
//! - [`Broker`]: Trait consumed by the trade queue
//! - [`BybitBroker`]: Bybit v5 implementation of [`Broker`]
//! - [`HttpTransport`]: Transport seam, with [`MockTransport`] for tests
//!
//! # Retry policy
//!
//! 1. Success -> result payload
//! 2. Timestamp-window code (10002/10003) -> forced resync, then retry
//! 3. Transport failure (connect, timeout, 5xx) -> retry
//! 4. Any other code -> terminal, never retried

pub mod broker;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod instruments;
pub mod signer;
pub mod transport;
pub mod wire;

// Broker seam
pub use broker::{Broker, BybitBroker, DynBroker, OrderAck};

// Client and clock
pub use client::SignedRequestClient;
pub use clock::{Clock, ClockOffset, ClockSample, ManualClock, SystemClock};

// Configuration
pub use config::BrokerConfig;

// Error types
pub use error::{BrokerError, BrokerResult};

// Instrument metadata
pub use instruments::{InstrumentCache, InstrumentSpec};

// Signing
pub use signer::{canonical_query, Credentials, RequestSigner};

// Transport
pub use transport::{
    BoxFuture, DynTransport, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockReply,
    MockTransport, ReqwestTransport,
};
