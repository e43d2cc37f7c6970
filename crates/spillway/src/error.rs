use std::io;
use std::path::PathBuf;

/// Result type returned by every fallible bucket and storage operation.
pub type BucketResult<T> = Result<T, BucketError>;

/// Errors raised by [`Bucket`](crate::Bucket) and the storage backends.
///
/// An insufficient fill is not an error; see [`PourOutcome`](crate::PourOutcome).
#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    /// A value passed to a setter or operation is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the bucket's current state.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// The storage location cannot be created or written to.
    #[error("permission denied for `{}`: {source}", .path.display())]
    Permission {
        /// Location that was refused.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A stored mark exists but does not hold exactly a timestamp and a fill.
    #[error("malformed mark for `{name}`: {record:?}")]
    Format {
        /// Bucket name the record belongs to.
        name: String,
        /// Raw record as found in storage.
        record: String,
    },

    /// Reading or writing the backing store failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BucketError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
