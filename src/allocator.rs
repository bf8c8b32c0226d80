//! Marker identifier allocation
//!
//! A single watermark (the next unused `marker_<N>` suffix) is persisted in a
//! metadata file shared by all dimensions. The watermark only ever moves up:
//! identifiers are never reused, even after the marker they named is gone.

use crate::model::MarkerId;
use crate::storage::{
    encode, read_if_exists, write_atomic, RetryPolicy, StorageError, StorageResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted allocator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorMeta {
    pub next_marker_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_markers: usize,
    #[serde(default)]
    pub total_categories: usize,
}

impl Default for AllocatorMeta {
    fn default() -> Self {
        Self {
            next_marker_id: 1,
            last_update: None,
            total_markers: 0,
            total_categories: 0,
        }
    }
}

/// Issues collision-free marker identifiers
#[derive(Debug)]
pub struct IdAllocator {
    path: PathBuf,
    retry: RetryPolicy,
    meta: AllocatorMeta,
    /// Watermark as last written to disk
    persisted: Option<u64>,
}

impl IdAllocator {
    /// Load the allocator from its metadata file, starting at 1 when absent
    ///
    /// A malformed file is logged and treated as absent; observing the live
    /// documents on the next cycle lifts the watermark above every existing id.
    pub fn open(path: impl Into<PathBuf>, retry: RetryPolicy) -> StorageResult<Self> {
        let path = path.into();
        let raw = retry.run(&path, || read_if_exists(&path))?;
        let (meta, persisted) = match raw {
            None => (AllocatorMeta::default(), None),
            Some(bytes) => match serde_json::from_slice::<AllocatorMeta>(&bytes) {
                Ok(mut meta) => {
                    meta.next_marker_id = meta.next_marker_id.max(1);
                    let watermark = meta.next_marker_id;
                    (meta, Some(watermark))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "malformed allocator metadata, starting from 1");
                    (AllocatorMeta::default(), None)
                }
            },
        };
        Ok(Self {
            path,
            retry,
            meta,
            persisted,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The next unused numeric suffix
    pub fn watermark(&self) -> u64 {
        self.meta.next_marker_id
    }

    pub fn meta(&self) -> &AllocatorMeta {
        &self.meta
    }

    /// Account for an identifier that already exists somewhere
    ///
    /// Returns true when the watermark moved. Identifiers not of the form
    /// `marker_<N>` are ignored. A watermark of `u64::MAX` means the id space
    /// is used up; `next` refuses from then on.
    pub fn observe(&mut self, id: &MarkerId) -> bool {
        let Some(n) = id.sequence() else {
            return false;
        };
        let floor = n.saturating_add(1);
        if floor > self.meta.next_marker_id {
            debug!(id = %id, watermark = floor, "watermark raised by existing id");
            self.meta.next_marker_id = floor;
            true
        } else {
            false
        }
    }

    /// Allocate a fresh identifier
    ///
    /// The advanced watermark is persisted before the identifier is returned;
    /// if that fails, nothing is allocated.
    pub fn next(&mut self) -> StorageResult<MarkerId> {
        let n = self.meta.next_marker_id;
        self.meta.next_marker_id = n.checked_add(1).ok_or(StorageError::IdsExhausted)?;
        if let Err(e) = self.persist() {
            self.meta.next_marker_id = n;
            return Err(e);
        }
        Ok(MarkerId::from_sequence(n))
    }

    /// Catch up with the metadata file, which another process may have advanced
    ///
    /// The watermark only moves up. Call with the data lock held.
    pub fn refresh(&mut self) -> StorageResult<()> {
        let Some(bytes) = self.retry.run(&self.path, || read_if_exists(&self.path))? else {
            return Ok(());
        };
        match serde_json::from_slice::<AllocatorMeta>(&bytes) {
            Ok(disk) => {
                if disk.next_marker_id > self.meta.next_marker_id {
                    debug!(
                        from = self.meta.next_marker_id,
                        to = disk.next_marker_id,
                        "watermark advanced on disk"
                    );
                    self.meta.next_marker_id = disk.next_marker_id;
                }
                self.meta.total_markers = disk.total_markers;
                self.meta.total_categories = disk.total_categories;
                self.persisted = Some(disk.next_marker_id);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed allocator metadata, keeping in-memory watermark");
                self.persisted = None;
            }
        }
        Ok(())
    }

    /// Record document totals, persisting only when something changed
    pub fn record_totals(&mut self, total_markers: usize, total_categories: usize) -> StorageResult<()> {
        let changed = self.persisted != Some(self.meta.next_marker_id)
            || self.meta.total_markers != total_markers
            || self.meta.total_categories != total_categories;
        self.meta.total_markers = total_markers;
        self.meta.total_categories = total_categories;
        if changed {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&mut self) -> StorageResult<()> {
        self.meta.last_update = Some(Utc::now());
        let text = encode(&self.meta)?;
        self.retry.run(&self.path, || write_atomic(&self.path, &text))?;
        self.persisted = Some(self.meta.next_marker_id);
        Ok(())
    }
}
