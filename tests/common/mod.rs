//! Shared fixtures for livemark integration tests
//!
//! `MapFixture` lays out a temporary data root with one directory per
//! dimension. `FlakyStore` wraps a `FileStore` and fails selected reads or
//! writes on demand.

#![allow(dead_code)]

use livemark::{
    Dimension, DocumentKind, DocumentStore, FileStore, IdAllocator, RetryPolicy, StorageError,
    StorageResult, SyncConfig, SyncEngine,
};
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const WORLD: &str = "world";
pub const NETHER: &str = "world_nether";
pub const END: &str = "world_the_end";

pub fn dim(name: &str) -> Dimension {
    Dimension::from(name)
}

pub struct MapFixture {
    pub dir: TempDir,
    pub config: SyncConfig,
}

impl MapFixture {
    /// A data root with the three standard dimensions
    pub fn new() -> Self {
        Self::with_dimensions(&[WORLD, NETHER, END])
    }

    pub fn with_dimensions(dimensions: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SyncConfig {
            data_root: dir.path().to_path_buf(),
            dimensions: dimensions.iter().map(|d| dim(d)).collect(),
            io_retry: RetryPolicy::none(),
            ..SyncConfig::default()
        };
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::new(self.root()).with_retry(RetryPolicy::none())
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::open(&self.config).expect("open engine")
    }

    /// Engine over an arbitrary store, sharing this fixture's metadata file
    pub fn engine_with(&self, store: Arc<dyn DocumentStore>) -> SyncEngine {
        let allocator =
            IdAllocator::open(self.config.meta_path(), RetryPolicy::none()).expect("allocator");
        SyncEngine::new(
            store,
            allocator,
            self.config.dimensions.clone(),
            self.config.sea_level,
        )
    }

    pub fn path(&self, dimension: &str, kind: DocumentKind) -> PathBuf {
        self.file_store().document_path(&dim(dimension), kind)
    }

    pub fn write_json(&self, dimension: &str, kind: DocumentKind, value: &Value) {
        let text = serde_json::to_string_pretty(value).expect("serialize fixture");
        self.write_raw(dimension, kind, &text);
    }

    pub fn write_raw(&self, dimension: &str, kind: DocumentKind, text: &str) {
        let path = self.path(dimension, kind);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        std::fs::write(path, text).expect("write fixture");
    }

    pub fn raw(&self, dimension: &str, kind: DocumentKind) -> String {
        std::fs::read_to_string(self.path(dimension, kind)).expect("read document")
    }

    pub fn json(&self, dimension: &str, kind: DocumentKind) -> Value {
        serde_json::from_str(&self.raw(dimension, kind)).expect("document is valid JSON")
    }

    /// Raw text of every live document, in dimension order
    pub fn snapshot(&self) -> Vec<String> {
        self.config
            .dimensions
            .iter()
            .flat_map(|d| {
                [DocumentKind::Markers, DocumentKind::Players]
                    .into_iter()
                    .map(move |k| (d.clone(), k))
            })
            .map(|(d, k)| self.raw(d.as_str(), k))
            .collect()
    }
}

/// Which operation a `FlakyStore` should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    Write,
}

/// `FileStore` that fails chosen `(op, dimension, kind)` triples
pub struct FlakyStore {
    inner: FileStore,
    failing: Mutex<HashSet<(Op, Dimension, DocumentKind)>>,
}

impl FlakyStore {
    pub fn new(inner: FileStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail(&self, op: Op, dimension: &str, kind: DocumentKind) {
        self.failing.lock().unwrap().insert((op, dim(dimension), kind));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn check(&self, op: Op, dimension: &Dimension, kind: DocumentKind) -> StorageResult<()> {
        if self.failing.lock().unwrap().contains(&(op, dimension.clone(), kind)) {
            return Err(StorageError::RetriesExhausted {
                path: self.inner.document_path(dimension, kind),
                attempts: 3,
                source: io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
            });
        }
        Ok(())
    }
}

impl DocumentStore for FlakyStore {
    fn read_raw(&self, dimension: &Dimension, kind: DocumentKind) -> StorageResult<Option<Vec<u8>>> {
        self.check(Op::Read, dimension, kind)?;
        self.inner.read_raw(dimension, kind)
    }

    fn write_raw(&self, dimension: &Dimension, kind: DocumentKind, contents: &str) -> StorageResult<()> {
        self.check(Op::Write, dimension, kind)?;
        self.inner.write_raw(dimension, kind, contents)
    }

    fn document_path(&self, dimension: &Dimension, kind: DocumentKind) -> PathBuf {
        self.inner.document_path(dimension, kind)
    }
}
