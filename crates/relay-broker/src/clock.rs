//! Clock offset tracking against exchange server time.
//!
//! Signed requests carry a millisecond timestamp that the exchange checks
//! against its own clock and the receive window. The offset measured here is
//! added to local time for every signature.
//!
//! # Offset Convention
//! `offset_ms = server_time - local_time`
//! - Positive: server clock is ahead of local
//! - Negative: server clock is behind local

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> i64;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// One published measurement. Offset and sync time always change together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockSample {
    /// `server_time - local_time` in milliseconds.
    pub offset_ms: i64,
    /// Local time of the last successful sync, `None` until the first one.
    pub synced_at_ms: Option<i64>,
}

/// Shared clock offset, starting at zero.
///
/// Readers never observe a half-applied resync: a new sample is computed
/// completely and then swapped in under the write lock.
pub struct ClockOffset {
    sample: RwLock<ClockSample>,
    clock: Arc<dyn Clock>,
}

impl ClockOffset {
    /// Threshold for warning about time drift (2 seconds).
    const DRIFT_WARN_THRESHOLD_MS: i64 = 2000;

    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sample: RwLock::new(ClockSample::default()),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Local time in milliseconds.
    pub fn local_now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Timestamp to sign with: local time plus the current offset.
    pub fn signed_timestamp_ms(&self) -> i64 {
        self.local_now_ms() + self.sample.read().offset_ms
    }

    /// Record a server time reading taken now and return the new offset.
    pub fn apply_server_time(&self, server_time_ms: i64) -> i64 {
        let local = self.local_now_ms();
        let offset = server_time_ms - local;

        if offset.abs() > Self::DRIFT_WARN_THRESHOLD_MS {
            tracing::warn!(offset_ms = offset, "significant time drift detected with server");
        }

        *self.sample.write() = ClockSample {
            offset_ms: offset,
            synced_at_ms: Some(local),
        };
        offset
    }

    /// True when never synced or the last sync is older than `interval`.
    pub fn needs_resync(&self, interval: Duration) -> bool {
        let synced_at = match self.sample.read().synced_at_ms {
            Some(ts) => ts,
            None => return true,
        };
        let age_ms = self.local_now_ms() - synced_at;
        age_ms > interval.as_millis() as i64
    }

    pub fn offset_ms(&self) -> i64 {
        self.sample.read().offset_ms
    }

    pub fn sample(&self) -> ClockSample {
        *self.sample.read()
    }
}

impl std::fmt::Debug for ClockOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockOffset")
            .field("sample", &self.sample())
            .finish()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    time_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(initial_ms: i64) -> Self {
        Self {
            time_ms: AtomicI64::new(initial_ms),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        self.time_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.time_ms.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_TIME: i64 = 1_000_000;

    fn offset_with_clock(initial_ms: i64) -> (Arc<ManualClock>, ClockOffset) {
        let clock = Arc::new(ManualClock::new(initial_ms));
        let offset = ClockOffset::new(clock.clone());
        (clock, offset)
    }

    #[test]
    fn test_starts_at_zero_and_unsynced() {
        let (_clock, offset) = offset_with_clock(BASE_TIME);
        assert_eq!(offset.offset_ms(), 0);
        assert_eq!(offset.sample().synced_at_ms, None);
        assert_eq!(offset.signed_timestamp_ms(), BASE_TIME);
        assert!(offset.needs_resync(Duration::from_secs(60)));
    }

    #[test]
    fn test_positive_offset_applied_to_signed_timestamp() {
        let (clock, offset) = offset_with_clock(BASE_TIME);

        assert_eq!(offset.apply_server_time(1_000_500), 500);
        assert_eq!(offset.signed_timestamp_ms(), BASE_TIME + 500);

        clock.advance(250);
        assert_eq!(offset.signed_timestamp_ms(), BASE_TIME + 250 + 500);
    }

    #[test]
    fn test_negative_offset() {
        let (_clock, offset) = offset_with_clock(BASE_TIME);

        assert_eq!(offset.apply_server_time(BASE_TIME - 500), -500);
        assert_eq!(offset.signed_timestamp_ms(), BASE_TIME - 500);
    }

    #[test]
    fn test_sample_published_together() {
        let (_clock, offset) = offset_with_clock(BASE_TIME);
        offset.apply_server_time(BASE_TIME + 42);

        assert_eq!(
            offset.sample(),
            ClockSample {
                offset_ms: 42,
                synced_at_ms: Some(BASE_TIME),
            }
        );
    }

    #[test]
    fn test_needs_resync_after_interval() {
        let (clock, offset) = offset_with_clock(BASE_TIME);
        offset.apply_server_time(BASE_TIME);
        let interval = Duration::from_secs(60);

        assert!(!offset.needs_resync(interval));
        clock.advance(60_000);
        assert!(!offset.needs_resync(interval));
        clock.advance(1);
        assert!(offset.needs_resync(interval));
    }

    #[test]
    fn test_large_drift_is_still_applied() {
        let (_clock, offset) = offset_with_clock(BASE_TIME);
        assert_eq!(offset.apply_server_time(BASE_TIME + 30_000), 30_000);
        assert_eq!(offset.signed_timestamp_ms(), BASE_TIME + 30_000);
    }
}
