use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::BucketConfig;
use crate::error::{BucketError, BucketResult};
use crate::mark::Mark;
use crate::storage::StorageBackend;

/// Weight poured by [`Bucket::pour_one`].
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Result of a [`Bucket::pour`] that reached a decision.
#[must_use]
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PourOutcome {
    /// The weight was drained and the new mark committed.
    Poured {
        /// Fill left after the pour.
        remaining: f64,
    },
    /// Not enough fill; storage was left untouched.
    Insufficient {
        /// Weight that was asked for.
        requested: f64,
        /// Fill available at the time of the decision.
        available: f64,
        /// How long until `requested` would be available, if it ever will be.
        ///
        /// `None` when the request exceeds the capacity or the bucket does
        /// not refill.
        retry_after: Option<Duration>,
    },
}

impl PourOutcome {
    /// Whether the pour succeeded.
    #[inline]
    #[must_use]
    pub fn is_poured(&self) -> bool {
        matches!(self, Self::Poured { .. })
    }
}

/// Fill owed to `mark` at `now`, saturating at `capacity`.
fn refill(mark: &Mark, capacity: f64, rate: f64, now: f64) -> f64 {
    let elapsed = (now - mark.timestamp).max(0.0);
    rate.mul_add(elapsed, mark.fill).min(capacity)
}

/// A named, capacity-bounded fill level that drains on [`pour`](Bucket::pour)
/// and refills continuously at a fixed rate.
///
/// State lives in a [`StorageBackend`] so it survives restarts and can be
/// shared by every `Bucket` that uses the same name and backend. Each pour
/// re-reads the stored [`Mark`] under the backend's per-name lock, so
/// concurrent pours from several instances never over-drain.
///
/// Capacity and rate are fixed once [`start`](Bucket::start) has been called.
///
/// ```
/// use std::sync::Arc;
///
/// use spillway::{Bucket, BucketConfig, ManualClock, MemoryStorage};
///
/// let clock = ManualClock::new(1_000.0);
/// let config = BucketConfig::new("api").with_capacity(10.0).with_rate(1.0);
/// let mut bucket = Bucket::with_storage(config, Arc::new(MemoryStorage::new()))
///     .unwrap()
///     .with_clock(clock.clone());
/// bucket.start().unwrap();
///
/// clock.advance(5.0);
/// assert!(bucket.pour(3.0).unwrap().is_poured());
/// assert_eq!(bucket.fill(), 2.0);
/// ```
#[derive(Debug)]
pub struct Bucket {
    name: String,
    capacity: f64,
    rate: f64,
    fill: f64,
    last_timestamp: Option<f64>,
    started: bool,
    storage: Option<Arc<dyn StorageBackend>>,
    clock: Arc<dyn Clock>,
}

impl Bucket {
    /// Create a new `Bucket` without storage.
    ///
    /// A backend must be attached with [`set_storage`](Self::set_storage)
    /// before [`start`](Self::start).
    pub fn new(config: BucketConfig) -> BucketResult<Self> {
        let mut bucket = Self {
            name: config.key(),
            capacity: 0.0,
            rate: 0.0,
            fill: 0.0,
            last_timestamp: None,
            started: false,
            storage: None,
            clock: Arc::new(SystemClock),
        };
        bucket.set_capacity(config.capacity)?;
        bucket.set_rate(config.rate)?;
        bucket.set_fill(config.fill)?;
        Ok(bucket)
    }

    /// Create a new `Bucket` persisted in `storage`.
    pub fn with_storage(config: BucketConfig, storage: Arc<dyn StorageBackend>) -> BucketResult<Self> {
        let mut bucket = Self::new(config)?;
        bucket.storage = Some(storage);
        Ok(bucket)
    }

    /// Use `clock` instead of the system clock.
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Attach a storage backend. Fails if one is already attached.
    pub fn set_storage(&mut self, storage: Arc<dyn StorageBackend>) -> BucketResult<()> {
        if self.storage.is_some() {
            return Err(BucketError::IllegalState("storage already attached"));
        }
        self.storage = Some(storage);
        Ok(())
    }

    /// Storage key: `prefix + "_" + name`.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Largest fill the bucket can hold.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Sets the capacity, lowering the current fill if it no longer fits.
    pub fn set_capacity(&mut self, capacity: f64) -> BucketResult<()> {
        if self.started {
            return Err(BucketError::IllegalState("capacity is fixed once the bucket is started"));
        }
        if !(capacity >= 0.0 && capacity.is_finite()) {
            return Err(BucketError::invalid(format!("capacity must be a non-negative number, got {capacity}")));
        }
        self.capacity = capacity;
        self.fill = self.fill.min(capacity);
        Ok(())
    }

    /// Units refilled per second.
    #[inline]
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Sets the refill rate.
    pub fn set_rate(&mut self, rate: f64) -> BucketResult<()> {
        if self.started {
            return Err(BucketError::IllegalState("rate is fixed once the bucket is started"));
        }
        if !(rate >= 0.0 && rate.is_finite()) {
            return Err(BucketError::invalid(format!("rate must be a non-negative number, got {rate}")));
        }
        self.rate = rate;
        Ok(())
    }

    /// Fill as of [`last_timestamp`](Self::last_timestamp).
    #[inline]
    #[must_use]
    pub fn fill(&self) -> f64 {
        self.fill
    }

    /// Sets the fill, clamped to the capacity.
    ///
    /// Before [`start`](Self::start) this is the fill a newly created mark gets.
    /// Afterwards it only changes the in-memory view; the next pour reloads
    /// the stored mark.
    pub fn set_fill(&mut self, fill: f64) -> BucketResult<()> {
        if !(fill >= 0.0) {
            return Err(BucketError::invalid(format!("fill must not be negative, got {fill}")));
        }
        self.fill = fill.min(self.capacity);
        Ok(())
    }

    /// Instant, in seconds since the Unix epoch, at which [`fill`](Self::fill)
    /// was last known to be correct. `None` until started.
    #[inline]
    #[must_use]
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Sets the last timestamp.
    ///
    /// Set before [`start`](Self::start), it backdates the mark created for a
    /// bucket that is not in storage yet.
    pub fn set_last_timestamp(&mut self, timestamp: f64) -> BucketResult<()> {
        if !(timestamp > 0.0 && timestamp.is_finite()) {
            return Err(BucketError::invalid(format!("timestamp must be a positive number, got {timestamp}")));
        }
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    /// Whether [`start`](Self::start) has succeeded.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    fn backend(&self) -> BucketResult<Arc<dyn StorageBackend>> {
        self.storage
            .clone()
            .ok_or(BucketError::IllegalState("no storage attached"))
    }

    /// Current time, never earlier than `mark`.
    fn now_after(&self, mark: &Mark) -> f64 {
        let now = self.clock.now();
        if now < mark.timestamp {
            tracing::warn!(
                name = %self.name,
                now,
                stored = mark.timestamp,
                "clock is behind the stored mark"
            );
            return mark.timestamp;
        }
        now
    }

    /// Load the bucket from storage, creating its mark if absent, and bring
    /// the fill up to date.
    ///
    /// Safe to call again at any time; each call re-syncs from storage. On
    /// failure the bucket is left exactly as it was.
    pub fn start(&mut self) -> BucketResult<()> {
        let storage = self.backend()?;
        storage.init()?;

        let (mark, now) = {
            let _guard = storage.lock(&self.name)?;
            match storage.read(&self.name)? {
                Some(mark) => {
                    tracing::debug!(name = %self.name, fill = mark.fill, "bucket loaded from storage");
                    let now = self.now_after(&mark);
                    (mark, now)
                }
                None => {
                    let now = self.clock.now();
                    let created_at = self.last_timestamp.map_or(now, |ts| ts.min(now));
                    let mark = Mark::new(created_at, self.fill);
                    storage.write(&self.name, &mark)?;
                    tracing::debug!(name = %self.name, fill = mark.fill, "bucket created in storage");
                    (mark, now)
                }
            }
        };

        self.fill = refill(&mark, self.capacity, self.rate, now);
        self.last_timestamp = Some(now);
        self.started = true;
        Ok(())
    }

    /// Try to drain `weight` from the bucket.
    ///
    /// The stored mark is re-read, refilled for the time elapsed since it was
    /// written, and, only if at least `weight` is available, replaced with the
    /// drained fill stamped with the current time. The whole sequence runs
    /// under the backend's lock for this bucket's name.
    ///
    /// Running short is not an error: it yields
    /// [`PourOutcome::Insufficient`] and leaves storage untouched.
    pub fn pour(&mut self, weight: f64) -> BucketResult<PourOutcome> {
        if !(weight >= 0.0 && weight.is_finite()) {
            return Err(BucketError::invalid(format!("weight must be a non-negative number, got {weight}")));
        }
        if !self.started {
            return Err(BucketError::IllegalState("bucket is not started"));
        }
        let storage = self.backend()?;
        let _guard = storage.lock(&self.name)?;

        let mark = match storage.read(&self.name)? {
            Some(mark) => mark,
            None => {
                tracing::warn!(name = %self.name, "mark vanished from storage, using last known state");
                Mark::new(self.last_timestamp.unwrap_or_else(|| self.clock.now()), self.fill)
            }
        };
        let now = self.now_after(&mark);
        let available = refill(&mark, self.capacity, self.rate, now);

        if weight <= available {
            let committed = Mark::new(now, available - weight);
            storage.write(&self.name, &committed)?;
            self.fill = committed.fill;
            self.last_timestamp = Some(now);
            tracing::trace!(name = %self.name, weight, remaining = committed.fill, "poured");
            return Ok(PourOutcome::Poured {
                remaining: committed.fill,
            });
        }

        self.fill = available;
        self.last_timestamp = Some(now);
        let retry_after = if weight > self.capacity || self.rate <= 0.0 {
            None
        } else {
            Duration::try_from_secs_f64((weight - available) / self.rate).ok()
        };
        tracing::debug!(name = %self.name, weight, available, "insufficient fill");
        Ok(PourOutcome::Insufficient {
            requested: weight,
            available,
            retry_after,
        })
    }

    /// [`pour`](Self::pour) the [`DEFAULT_WEIGHT`].
    #[inline]
    pub fn pour_one(&mut self) -> BucketResult<PourOutcome> {
        self.pour(DEFAULT_WEIGHT)
    }
}
