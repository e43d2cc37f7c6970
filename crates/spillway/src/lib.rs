/*!
# Spillway

A persistent leaky/token bucket rate limiter.

A [`Bucket`] is a named fill level bounded by a capacity. [`Bucket::pour`]
drains it on demand and it refills continuously at a fixed rate, which gives
callers a sustained rate with a burst allowance equal to the capacity.

Bucket state is kept as a [`Mark`], a `(timestamp, fill)` pair, in a
[`StorageBackend`], so it survives process restarts and is shared by every
bucket using the same name and backend. Refill is computed lazily on each
`start`/`pour`; nothing runs in the background.

## Stores

* [`MemoryStorage`]: process-local, deterministic, no I/O.
* [`FileStorage`] (feature `file-store`, on by default): one file per bucket
  name, guarded by OS file locks so several processes can share a directory.

Other stores, such as a network key/value service, implement
[`StorageBackend`].

## Example

```no_run
use std::sync::Arc;

use spillway::{Bucket, BucketConfig, FileStorage};

# fn main() -> spillway::BucketResult<()> {
let config = BucketConfig::new("uploads").with_capacity(20.0).with_rate(2.0);
let mut bucket = Bucket::with_storage(config, Arc::new(FileStorage::default()))?;
bucket.start()?;

if bucket.pour(5.0)?.is_poured() {
    // go ahead
}
# Ok(())
# }
```
*/
#![cfg_attr(docsrs, feature(doc_cfg))]

mod bucket;
mod clock;
mod config;
mod error;
mod mark;
mod storage;

pub use bucket::{Bucket, DEFAULT_WEIGHT, PourOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BucketConfig, DEFAULT_CAPACITY, DEFAULT_FILL, DEFAULT_NAME, DEFAULT_PREFIX, DEFAULT_RATE,
};
pub use error::{BucketError, BucketResult};
pub use mark::{MARK_DELIMITER, Mark};
pub use storage::{MarkLock, MemoryStorage, StorageBackend};
#[cfg(feature = "file-store")]
pub use storage::{FileStorage, default_path};
