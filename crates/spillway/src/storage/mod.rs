//! Durable homes for bucket [`Mark`]s.

use std::fmt::{self, Debug, Formatter};
#[cfg(feature = "file-store")]
use std::fs::File;

use parking_lot::RawMutex;
use parking_lot::lock_api::ArcMutexGuard;

use crate::error::BucketResult;
use crate::mark::Mark;

mod memory;
pub use memory::MemoryStorage;

#[cfg(feature = "file-store")]
mod file;
#[cfg(feature = "file-store")]
pub use file::{FileStorage, default_path};

/// Key/value store of marks, keyed by bucket name.
///
/// A [`Bucket`](crate::Bucket) takes [`lock`](StorageBackend::lock) before every
/// read-decide-write sequence and holds it until the sequence is over, so
/// `read` and `write` never need to be atomic on their own across calls.
pub trait StorageBackend: Debug + Send + Sync + 'static {
    /// Prepare the backend for use.
    ///
    /// Fails with [`BucketError::Permission`](crate::BucketError::Permission) when
    /// durable writes cannot be guaranteed. Must be safe to call repeatedly.
    fn init(&self) -> BucketResult<()> {
        Ok(())
    }

    /// Take exclusive access to `name` until the returned guard is dropped.
    fn lock(&self, name: &str) -> BucketResult<MarkLock>;

    /// Stored mark for `name`, or `None` if it was never written.
    fn read(&self, name: &str) -> BucketResult<Option<Mark>>;

    /// Replace the mark for `name`. Durable once this returns.
    fn write(&self, name: &str, mark: &Mark) -> BucketResult<()>;
}

/// Exclusive access to one bucket name, released on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct MarkLock {
    _guard: MarkLockInner,
}

#[allow(dead_code)]
enum MarkLockInner {
    Mutex(ArcMutexGuard<RawMutex, ()>),
    #[cfg(feature = "file-store")]
    File(File),
}

impl Debug for MarkLockInner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutex(_) => f.write_str("Mutex"),
            #[cfg(feature = "file-store")]
            Self::File(file) => f.debug_tuple("File").field(file).finish(),
        }
    }
}

impl MarkLock {
    /// Guard backed by an in-process mutex.
    pub fn mutex(guard: ArcMutexGuard<RawMutex, ()>) -> Self {
        Self {
            _guard: MarkLockInner::Mutex(guard),
        }
    }

    /// Guard backed by a file holding an OS exclusive lock.
    ///
    /// Closing the file releases the lock.
    #[cfg(feature = "file-store")]
    pub fn file(locked: File) -> Self {
        Self {
            _guard: MarkLockInner::File(locked),
        }
    }
}
