use std::fmt::{self, Display, Formatter};

use crate::error::{BucketError, BucketResult};

/// Separator between the two fields of a stored record.
pub const MARK_DELIMITER: char = ':';

/// Durable `(timestamp, fill)` snapshot of one bucket.
///
/// The text form is `"<timestamp>:<fill>"`, both fields in plain decimal with
/// the shortest digits that read back to the same value, e.g.
/// `1377900000.123456:7.5`. Records written with a fixed number of fractional
/// digits, such as `1377900000.123456:7.500000`, decode as well.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Mark {
    /// Instant, in seconds since the Unix epoch, at which `fill` was correct.
    pub timestamp: f64,
    /// Fill level at `timestamp`.
    pub fill: f64,
}

impl Mark {
    /// Create a new `Mark`.
    #[inline]
    pub const fn new(timestamp: f64, fill: f64) -> Self {
        Self { timestamp, fill }
    }

    /// Parse a stored record belonging to bucket `name`.
    ///
    /// Anything other than exactly two finite numbers, with a non-negative
    /// fill, is a [`BucketError::Format`].
    pub fn decode(name: &str, record: &str) -> BucketResult<Self> {
        let malformed = || BucketError::Format {
            name: name.to_owned(),
            record: record.to_owned(),
        };
        let mut parts = record.trim().split(MARK_DELIMITER);
        let (Some(timestamp), Some(fill), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        let timestamp = timestamp.trim().parse::<f64>().map_err(|_| malformed())?;
        let fill = fill.trim().parse::<f64>().map_err(|_| malformed())?;
        if !timestamp.is_finite() || !fill.is_finite() || fill < 0.0 {
            return Err(malformed());
        }
        Ok(Self { timestamp, fill })
    }

    /// Text form written by the file backend.
    #[inline]
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl Display for Mark {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{MARK_DELIMITER}{}", self.timestamp, self.fill)
    }
}
