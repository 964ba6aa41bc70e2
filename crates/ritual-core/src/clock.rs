//! Time sources.
//!
//! Every engine in this crate reads time through a [`Clock`] so that the
//! same code runs against the wall clock in production and against a
//! controllable clock in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Epoch clock driven by the tokio timer.
///
/// Anchored to an epoch value at construction and advanced by
/// `tokio::time::Instant`, so it follows `tokio::time::pause()` and
/// `advance()` in tests while still producing epoch-shaped timestamps.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    origin_epoch_ms: u64,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::anchored_at(SystemClock.now_ms())
    }

    /// Anchor the clock so that "now" reads as `epoch_ms`.
    pub fn anchored_at(epoch_ms: u64) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            origin_epoch_ms: epoch_ms,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.origin);
        self.origin_epoch_ms
            .saturating_add(elapsed.as_millis() as u64)
    }
}

/// Convert epoch milliseconds to a UTC timestamp for event stamping.
pub fn epoch_ms_to_datetime(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or(DateTime::UNIX_EPOCH)
}
