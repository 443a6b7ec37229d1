//! Clock sources

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::types::Millis;

/// Supplies the current time on demand
pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin
    fn now_ms(&self) -> Millis;
    /// Wall-clock time, used for `created_at` stamps
    fn wall_now(&self) -> DateTime<Utc>;
}

/// Real clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and scripted replays.
///
/// Clones share the same time, so a test can keep one handle while the
/// recorder owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    epoch: DateTime<Utc>,
}

impl ManualClock {
    /// Start at monotonic 0, with `epoch` as the matching wall-clock time
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(0)),
            epoch,
        }
    }

    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: Millis) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }

    fn wall_now(&self) -> DateTime<Utc> {
        // out-of-range offsets fall back to the epoch
        i64::try_from(self.now_ms())
            .ok()
            .and_then(|ms| self.epoch.checked_add_signed(ChronoDuration::milliseconds(ms)))
            .unwrap_or(self.epoch)
    }
}
