use serde::{Deserialize, Serialize};

/// Default burst allowance.
pub const DEFAULT_CAPACITY: f64 = 10.0;
/// Default refill rate, in units per second.
pub const DEFAULT_RATE: f64 = 0.167;
/// Default initial fill.
pub const DEFAULT_FILL: f64 = 0.0;
/// Default logical bucket name.
pub const DEFAULT_NAME: &str = "default";
/// Default storage namespace prefix.
pub const DEFAULT_PREFIX: &str = "LeakyBucket";

/// Settings a [`Bucket`](crate::Bucket) is built from.
///
/// Every field is optional when deserializing; missing fields take the
/// `DEFAULT_*` values and unknown fields are ignored. `max` is accepted as an
/// alias of `capacity`.
///
/// ```
/// use spillway::BucketConfig;
///
/// let config = BucketConfig::new("uploads").with_capacity(20.0).with_rate(2.0);
/// assert_eq!(config.key(), "LeakyBucket_uploads");
/// ```
#[non_exhaustive]
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(default)]
pub struct BucketConfig {
    /// Logical name of the bucket.
    pub name: String,
    /// Namespace prepended to `name` to form the storage key.
    pub prefix: String,
    /// Largest fill the bucket can hold.
    #[serde(alias = "max")]
    pub capacity: f64,
    /// Units refilled per second.
    pub rate: f64,
    /// Fill used when the bucket is created in storage for the first time.
    pub fill: f64,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            prefix: DEFAULT_PREFIX.to_owned(),
            capacity: DEFAULT_CAPACITY,
            rate: DEFAULT_RATE,
            fill: DEFAULT_FILL,
        }
    }
}

impl BucketConfig {
    /// Create a new `BucketConfig` with default settings and the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the storage namespace prefix.
    #[inline]
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the refill rate.
    #[inline]
    #[must_use]
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the initial fill.
    #[inline]
    #[must_use]
    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    /// Storage key of the bucket: `prefix + "_" + name`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}_{}", self.prefix, self.name)
    }
}
