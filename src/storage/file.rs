//! Filesystem storage backend
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/<dimension>/live/markers.json
//! <root>/<dimension>/live/players.json
//! <root>/<dimension>/settings.json
//! ```

use super::retry::RetryPolicy;
use super::traits::{DocumentStore, StorageError, StorageResult};
use crate::model::{Dimension, DocumentKind};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding the documents the viewer polls
const LIVE_DIR: &str = "live";

/// File-backed document store
///
/// Writes go to a sibling temp file which is synced and then renamed over the
/// target, so readers see either the old or the new document.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    retry: RetryPolicy,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

/// Dimension names become directory names; refuse anything that could
/// escape the data root.
fn validate(dimension: &Dimension) -> StorageResult<()> {
    let name = dimension.as_str();
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        return Err(StorageError::InvalidDimension(name.to_string()));
    }
    Ok(())
}

impl DocumentStore for FileStore {
    fn read_raw(&self, dimension: &Dimension, kind: DocumentKind) -> StorageResult<Option<Vec<u8>>> {
        validate(dimension)?;
        let path = self.document_path(dimension, kind);
        self.retry.run(&path, || read_if_exists(&path))
    }

    fn write_raw(&self, dimension: &Dimension, kind: DocumentKind, contents: &str) -> StorageResult<()> {
        validate(dimension)?;
        let path = self.document_path(dimension, kind);
        self.retry.run(&path, || write_atomic(&path, contents))?;
        debug!(path = %path.display(), bytes = contents.len(), "wrote document");
        Ok(())
    }

    fn document_path(&self, dimension: &Dimension, kind: DocumentKind) -> PathBuf {
        let dir = self.root.join(dimension.as_str());
        if kind.is_live() {
            dir.join(LIVE_DIR).join(kind.file_name())
        } else {
            dir.join(kind.file_name())
        }
    }
}

/// Read a file's bytes, `None` when it does not exist
///
/// Content is not decoded here: text that is not UTF-8 is a malformed
/// document, not an I/O failure.
pub fn read_if_exists(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replace `path` with `contents` via temp file and rename
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = temp_path_for(path);

    let result = File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp_path, path));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
