//! The sync engine: merge cycles plus marker commands

use super::lock::{DataLock, DataLockGuard};
use super::SyncError;
use crate::allocator::IdAllocator;
use crate::config::SyncConfig;
use crate::index::{MarkerRef, SearchIndex};
use crate::merge::{CrossDimensionMerger, DimensionReport, MergeOutcome};
use crate::model::{
    Dimension, MarkerCategory, MarkerDocument, MarkerEntry, MarkerId, PlayerDocument, Position,
    SettingsDocument,
};
use crate::storage::{DocumentStore, DocumentStoreExt, FileStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub type SyncResult<T> = Result<T, SyncError>;

/// Summary of one merge cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Sequence number of the cycle since the engine was created, from 1
    pub cycle: u64,
    pub markers: usize,
    pub categories: usize,
    pub players: usize,
    pub collisions: usize,
    pub rekeyed: usize,
    pub stale: usize,
    pub written: usize,
    pub dimensions: Vec<DimensionReport>,
    pub elapsed: Duration,
}

impl CycleReport {
    fn from_outcome(cycle: u64, outcome: MergeOutcome, elapsed: Duration) -> Self {
        Self {
            cycle,
            markers: outcome.view.marker_count(),
            categories: outcome.view.category_count(),
            players: outcome.view.players.len(),
            collisions: outcome.view.collisions.len(),
            rekeyed: outcome.rekeyed,
            stale: outcome.stale,
            written: outcome.documents_written(),
            dimensions: outcome.reports,
            elapsed,
        }
    }

    /// True when every document was read and, if needed, written
    pub fn is_clean(&self) -> bool {
        self.dimensions.iter().all(|d| !d.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &DimensionReport> {
        self.dimensions.iter().filter(|d| d.is_failure())
    }
}

/// Owns the store, allocator and index, and serializes every mutation
///
/// Merge cycles and marker commands take the allocator lock, so no two of
/// them overlap within a process. With a [`DataLock`] they also hold it
/// exclusively, which keeps them apart from other processes on the same data
/// root. Readers (`find_*`, `read_*`) take neither.
pub struct SyncEngine {
    store: Arc<dyn DocumentStore>,
    merger: CrossDimensionMerger,
    allocator: Mutex<IdAllocator>,
    data_lock: Option<DataLock>,
    index: SearchIndex,
    cycles: AtomicU64,
}

/// Both locks, held for one mutation
struct Serialized<'a> {
    allocator: MutexGuard<'a, IdAllocator>,
    _data: Option<DataLockGuard>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        allocator: IdAllocator,
        dimensions: Vec<Dimension>,
        sea_level: f64,
    ) -> Self {
        let merger = CrossDimensionMerger::new(store.clone(), dimensions, sea_level);
        Self {
            store,
            merger,
            allocator: Mutex::new(allocator),
            data_lock: None,
            index: SearchIndex::new(),
            cycles: AtomicU64::new(0),
        }
    }

    /// Also hold `lock` across every mutation
    pub fn with_lock(mut self, lock: DataLock) -> Self {
        self.data_lock = Some(lock);
        self
    }

    /// Engine over a [`FileStore`] rooted at `config.data_root`, locked
    /// against other processes on the same root
    pub fn open(config: &SyncConfig) -> SyncResult<Self> {
        let store = FileStore::new(&config.data_root).with_retry(config.io_retry);
        let allocator = IdAllocator::open(config.meta_path(), config.io_retry)?;
        Ok(Self::new(
            Arc::new(store),
            allocator,
            config.dimensions.clone(),
            config.sea_level,
        )
        .with_lock(DataLock::in_root(&config.data_root)))
    }

    pub fn dimensions(&self) -> &[Dimension] {
        self.merger.dimensions()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Number of cycles completed so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Current allocator watermark
    pub fn watermark(&self) -> u64 {
        self.lock_allocator().watermark()
    }

    fn lock_allocator(&self) -> MutexGuard<'_, IdAllocator> {
        self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the in-process lock, then the data lock, then catch up with
    /// whatever other processes allocated meanwhile
    fn serialize(&self) -> SyncResult<Serialized<'_>> {
        let mut allocator = self.lock_allocator();
        let data = match &self.data_lock {
            Some(lock) => {
                let guard = lock.exclusive()?;
                allocator.refresh()?;
                Some(guard)
            }
            None => None,
        };
        Ok(Serialized {
            allocator,
            _data: data,
        })
    }

    fn check_dimension(&self, dimension: &Dimension) -> SyncResult<()> {
        if self.dimensions().contains(dimension) {
            Ok(())
        } else {
            Err(SyncError::UnknownDimension(dimension.to_string()))
        }
    }

    /// Run one merge cycle and rebuild the search index
    ///
    /// Fails only when the data lock or allocator metadata cannot be read;
    /// document errors are reported in the [`CycleReport`].
    pub fn run_cycle(&self) -> SyncResult<CycleReport> {
        let mut held = self.serialize()?;
        Ok(self.cycle_locked(&mut held.allocator))
    }

    /// Rebuild the search index from the documents on disk without writing
    ///
    /// For one-shot queries: no document is rewritten, no id is allocated,
    /// and the cycle counter does not move.
    pub fn load_index(&self) -> SyncResult<()> {
        let _shared = match &self.data_lock {
            Some(lock) => Some(lock.shared()?),
            None => None,
        };
        self.index.rebuild(&self.merger.view());
        Ok(())
    }

    fn cycle_locked(&self, allocator: &mut IdAllocator) -> CycleReport {
        let started = Instant::now();
        let outcome = self.merger.merge(allocator);
        self.index.rebuild(&outcome.view);

        if let Err(e) =
            allocator.record_totals(outcome.view.marker_count(), outcome.view.category_count())
        {
            warn!(error = %e, "could not record totals in allocator metadata");
        }

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let report = CycleReport::from_outcome(cycle, outcome, started.elapsed());
        for failed in report.failures() {
            warn!(
                cycle,
                dimension = %failed.dimension,
                markers = ?failed.markers,
                players = ?failed.players,
                "dimension not fully synchronized"
            );
        }
        info!(
            cycle,
            markers = report.markers,
            categories = report.categories,
            players = report.players,
            written = report.written,
            rekeyed = report.rekeyed,
            collisions = report.collisions,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sync cycle complete"
        );
        report
    }

    /// Make every id currently on disk known to the allocator
    fn observe_all(&self, allocator: &mut IdAllocator) {
        for dimension in self.dimensions() {
            match self.store.read::<MarkerDocument>(dimension) {
                Ok(document) => {
                    for (_, id, _) in document.iter_markers() {
                        allocator.observe(id);
                    }
                }
                Err(e) => warn!(dimension = %dimension, error = %e, "could not read markers to observe ids"),
            }
        }
    }

    /// Create a marker owned by `dimension` and propagate it
    ///
    /// The category is created with an implicit label if it does not exist.
    /// Returns the new marker's id.
    pub fn add_marker(
        &self,
        dimension: &Dimension,
        category_id: &str,
        label: &str,
        position: Position,
    ) -> SyncResult<MarkerId> {
        self.check_dimension(dimension)?;
        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err(SyncError::InvalidInput("category id must not be empty".into()));
        }
        if label.trim().is_empty() {
            return Err(SyncError::InvalidInput("label must not be empty".into()));
        }
        if ![position.x, position.y, position.z].iter().all(|c| c.is_finite()) {
            return Err(SyncError::InvalidInput("coordinates must be finite".into()));
        }

        let mut held = self.serialize()?;
        let allocator = &mut *held.allocator;
        let mut document = self.store.read::<MarkerDocument>(dimension)?;
        self.observe_all(allocator);
        let id = allocator.next()?;

        let category = document.category_mut_or_insert(category_id);
        let mut entry = MarkerEntry::new(label, position)
            .with_origin(dimension.clone())
            .with_icon(MarkerCategory::default_icon(category_id));
        entry.original_name = Some(label.to_string());
        entry.original_id = Some(id.to_string());
        entry.category_name = Some(category.label.clone());
        category.markers.insert(id.clone(), entry);

        self.store.write(dimension, &document)?;
        info!(dimension = %dimension, category = category_id, id = %id, "marker added");

        self.cycle_locked(allocator);
        Ok(id)
    }

    /// Delete a marker from its owning dimension
    ///
    /// Returns false when no dimension owns `id`. The id is not reused.
    pub fn remove_marker(&self, id: &MarkerId) -> SyncResult<bool> {
        let mut held = self.serialize()?;
        let mut removed = false;
        for dimension in self.dimensions() {
            let mut document = self.store.read::<MarkerDocument>(dimension)?;
            let owned = document
                .find(id)
                .map(|(_, entry)| entry.origin_or(dimension) == dimension)
                .unwrap_or(false);
            if !owned {
                continue;
            }
            document.remove(id);
            self.store.write(dimension, &document)?;
            info!(dimension = %dimension, id = %id, "marker removed");
            removed = true;
        }
        if removed {
            self.cycle_locked(&mut held.allocator);
        }
        Ok(removed)
    }

    pub fn find_by_name(&self, query: &str) -> Vec<MarkerRef> {
        self.index.find_by_name(query)
    }

    pub fn find_by_id(&self, id: &MarkerId) -> Option<MarkerRef> {
        self.index.find_by_id(id)
    }

    /// Like [`find_by_id`](Self::find_by_id), as an error when absent
    pub fn marker(&self, id: &MarkerId) -> SyncResult<MarkerRef> {
        self.find_by_id(id)
            .ok_or_else(|| SyncError::MarkerNotFound(id.to_string()))
    }

    pub fn read_markers(&self, dimension: &Dimension) -> SyncResult<MarkerDocument> {
        self.check_dimension(dimension)?;
        Ok(self.store.read(dimension)?)
    }

    pub fn read_players(&self, dimension: &Dimension) -> SyncResult<PlayerDocument> {
        self.check_dimension(dimension)?;
        Ok(self.store.read(dimension)?)
    }

    pub fn read_settings(&self, dimension: &Dimension) -> SyncResult<SettingsDocument> {
        self.check_dimension(dimension)?;
        Ok(self.store.read(dimension)?)
    }
}
