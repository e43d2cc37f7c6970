use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;

/// Source of wall-clock samples, in seconds since the Unix epoch.
pub trait Clock: Debug + Send + Sync + 'static {
    /// Current time in fractional seconds.
    fn now(&self) -> f64;
}

/// Clock reading the system wall clock.
#[derive(Clone, Copy, Default, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> f64 {
        OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1_000_000_000.0
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give another
/// to a [`Bucket`](crate::Bucket).
#[derive(Clone, Default, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Create a new `ManualClock` reading `now`.
    pub fn new(now: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Jump to `now`. Moving backwards is allowed.
    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: f64) {
        *self.now.lock() += secs;
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
