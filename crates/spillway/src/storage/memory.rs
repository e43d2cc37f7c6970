use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{MarkLock, StorageBackend};
use crate::error::BucketResult;
use crate::mark::Mark;

/// Process-local store, mostly useful for tests and single-process services.
///
/// Clones share the same marks and locks.
#[derive(Clone, Default, Debug)]
pub struct MemoryStorage {
    marks: Arc<Mutex<HashMap<String, Mark>>>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl MemoryStorage {
    /// Create a new, empty `MemoryStorage`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored marks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.lock().len()
    }

    /// Whether no mark has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.lock().is_empty()
    }

    fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl StorageBackend for MemoryStorage {
    fn lock(&self, name: &str) -> BucketResult<MarkLock> {
        let lock = self.name_lock(name);
        Ok(MarkLock::mutex(lock.lock_arc()))
    }

    fn read(&self, name: &str) -> BucketResult<Option<Mark>> {
        Ok(self.marks.lock().get(name).copied())
    }

    fn write(&self, name: &str, mark: &Mark) -> BucketResult<()> {
        self.marks.lock().insert(name.to_owned(), *mark);
        Ok(())
    }
}
