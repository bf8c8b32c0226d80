//! Livemark: live marker and player synchronization for multi-dimension web maps
//!
//! A map viewer polls one marker document and one player document per world
//! dimension. Livemark keeps them consistent: every dimension's document
//! lists every marker category, each marker stays in the dimension that owns
//! it, and every dimension sees all online players with a flag telling which
//! of them are elsewhere.
//!
//! # Core Concepts
//!
//! - **Dimensions**: world partitions, each with its own directory of documents
//! - **Origin**: the dimension whose document owns a marker or player entry
//! - **Merge cycle**: read all documents, unify, write each dimension back
//! - **Watermark**: the next unused `marker_<N>` id, persisted and never reused
//!
//! # Example
//!
//! ```no_run
//! use livemark::{SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::open(&SyncConfig::default()).unwrap();
//! let report = engine.run_cycle().unwrap();
//! println!("{} markers in {} categories", report.markers, report.categories);
//! ```

pub mod allocator;
pub mod config;
pub mod index;
pub mod merge;
mod model;
pub mod storage;
pub mod sync;

pub use allocator::{AllocatorMeta, IdAllocator};
pub use config::{ConfigError, SyncConfig};
pub use index::{MarkerRef, SearchIndex};
pub use merge::{CrossDimensionMerger, DimensionReport, DocumentOutcome, MergeOutcome, UnifiedView};
pub use model::{
    Anchor, CategoryId, Dimension, DocumentKind, LiveFlags, MarkerCategory, MarkerDocument,
    MarkerEntry, MarkerId, MarkerPosition, PlayerDocument, PlayerEntry, PlayerMarkerSet, Position,
    Rotation, SettingsDocument, StartLocation,
};
pub use storage::{
    DocumentStore, DocumentStoreExt, FileStore, Loaded, ReadState, RetryPolicy, StorageError,
    StorageResult,
};
pub use sync::{CycleReport, CycleTrigger, DataLock, SyncEngine, SyncError, SyncResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
