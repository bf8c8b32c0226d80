//! Advisory lock on the data root
//!
//! Every process that writes documents (the watch daemon and one-shot CLI
//! commands alike) holds the exclusive lock for the whole read-merge-write
//! pass. Read-only queries take it shared, so they never see one dimension
//! from before a pass and another from after it.

use crate::storage::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock file name under the data root
pub const LOCK_FILE: &str = ".livemark.lock";

#[derive(Debug, Clone)]
pub struct DataLock {
    path: PathBuf,
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct DataLockGuard {
    file: File,
    path: PathBuf,
}

impl DataLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lock at the conventional location under `data_root`
    pub fn in_root(data_root: &Path) -> Self {
        Self::new(data_root.join(LOCK_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until no other holder remains
    pub fn exclusive(&self) -> StorageResult<DataLockGuard> {
        let file = self.open()?;
        file.lock_exclusive().map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), "data lock held");
        Ok(DataLockGuard {
            file,
            path: self.path.clone(),
        })
    }

    /// Block until no exclusive holder remains
    pub fn shared(&self) -> StorageResult<DataLockGuard> {
        let file = self.open()?;
        file.lock_shared().map_err(|source| self.io_error(source))?;
        Ok(DataLockGuard {
            file,
            path: self.path.clone(),
        })
    }

    fn open(&self) -> StorageResult<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for DataLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "could not release data lock");
        }
    }
}
