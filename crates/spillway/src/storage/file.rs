use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{MarkLock, StorageBackend};
use crate::error::{BucketError, BucketResult};
use crate::mark::Mark;

/// Directory used by [`FileStorage::default`]: `<temp dir>/buckets`.
#[must_use]
pub fn default_path() -> PathBuf {
    std::env::temp_dir().join("buckets")
}

/// Suffix of the lock file kept next to each mark file.
const LOCK_SUFFIX: &str = ".lock";

/// Stores each mark in its own file, named after the bucket, under one directory.
///
/// [`lock`](StorageBackend::lock) takes an OS exclusive lock on a `<name>.lock`
/// file beside the mark, so buckets sharing a directory are serialized across
/// processes, not only across threads. The mark file itself is never locked
/// and can be opened freely by `read` and `write` while the guard is held.
/// An empty mark file holds no mark yet.
#[derive(Clone, Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new(default_path())
    }
}

impl FileStorage {
    /// Create a new `FileStorage` rooted at `path`.
    ///
    /// Nothing touches the filesystem until [`init`](StorageBackend::init).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory holding the mark files.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mark_path(&self, name: &str) -> BucketResult<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
            || name.ends_with(LOCK_SUFFIX)
        {
            return Err(BucketError::invalid(format!(
                "`{name}` cannot be used as a file name"
            )));
        }
        Ok(self.path.join(name))
    }

    fn lock_path(&self, name: &str) -> BucketResult<PathBuf> {
        let mut path = self.mark_path(name)?.into_os_string();
        path.push(LOCK_SUFFIX);
        Ok(path.into())
    }
}

fn map_io_error(path: &Path, e: io::Error) -> BucketError {
    match e.kind() {
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => BucketError::Permission {
            path: path.to_path_buf(),
            source: e,
        },
        _ => BucketError::Io(e),
    }
}

impl StorageBackend for FileStorage {
    fn init(&self) -> BucketResult<()> {
        let permission = |source| BucketError::Permission {
            path: self.path.clone(),
            source,
        };
        fs::create_dir_all(&self.path).map_err(permission)?;
        // Probe write access with an anonymous file.
        tempfile::tempfile_in(&self.path).map_err(permission)?;
        tracing::debug!(path = %self.path.display(), "file storage ready");
        Ok(())
    }

    fn lock(&self, name: &str) -> BucketResult<MarkLock> {
        let path = self.lock_path(name)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| map_io_error(&path, e))?;
        file.lock().map_err(|e| map_io_error(&path, e))?;
        Ok(MarkLock::file(file))
    }

    fn read(&self, name: &str) -> BucketResult<Option<Mark>> {
        let path = self.mark_path(name)?;
        let record = match fs::read_to_string(&path) {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io_error(&path, e)),
        };
        if record.is_empty() {
            return Ok(None);
        }
        Mark::decode(name, &record)
            .inspect_err(|e| tracing::warn!(error = %e, path = %path.display(), "corrupt mark file"))
            .map(Some)
    }

    fn write(&self, name: &str, mark: &Mark) -> BucketResult<()> {
        let path = self.mark_path(name)?;
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| map_io_error(&path, e))?;
        file.write_all(mark.encode().as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}
