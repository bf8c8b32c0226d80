//! One full merge pass over every configured dimension

use super::markers::{normalize_markers, project_markers, unify_markers};
use super::players::{project_players, unify_players};
use super::view::UnifiedView;
use crate::allocator::IdAllocator;
use crate::model::{Dimension, MarkerDocument, PlayerDocument};
use crate::storage::{
    Document, DocumentStore, DocumentStoreExt, Loaded, ReadState, StorageError, StorageResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// What happened to one document during a merge
#[derive(Debug)]
pub enum DocumentOutcome {
    /// Rewritten; carries how the previous contents were read
    Written(ReadState),
    /// Already held exactly the merged content
    Unchanged,
    /// Could not be read, so it was left alone this cycle; its last good
    /// contents stood in for it in the merge
    ReadFailed(StorageError),
    WriteFailed(StorageError),
}

impl DocumentOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ReadFailed(_) | Self::WriteFailed(_))
    }

    pub fn was_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Per-dimension results of a merge
#[derive(Debug)]
pub struct DimensionReport {
    pub dimension: Dimension,
    pub markers: DocumentOutcome,
    pub players: DocumentOutcome,
}

impl DimensionReport {
    pub fn is_failure(&self) -> bool {
        self.markers.is_failure() || self.players.is_failure()
    }
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub view: UnifiedView,
    pub reports: Vec<DimensionReport>,
    /// Markers given a fresh id this pass
    pub rekeyed: usize,
    /// Echo copies dropped this pass
    pub stale: usize,
}

impl MergeOutcome {
    pub fn documents_written(&self) -> usize {
        self.reports
            .iter()
            .map(|r| r.markers.was_written() as usize + r.players.was_written() as usize)
            .sum()
    }

    pub fn failed_dimensions(&self) -> impl Iterator<Item = &DimensionReport> {
        self.reports.iter().filter(|r| r.is_failure())
    }
}

/// Last successfully read contents of each dimension's documents
#[derive(Debug, Default)]
struct LastGood {
    markers: HashMap<Dimension, MarkerDocument>,
    players: HashMap<Dimension, PlayerDocument>,
}

/// Merges marker and player documents across dimensions
///
/// Each dimension ends up holding every category and only its own markers,
/// while every dimension's player document lists all online players.
pub struct CrossDimensionMerger {
    store: Arc<dyn DocumentStore>,
    dimensions: Vec<Dimension>,
    sea_level: f64,
    last_good: Mutex<LastGood>,
}

impl CrossDimensionMerger {
    pub fn new(store: Arc<dyn DocumentStore>, dimensions: Vec<Dimension>, sea_level: f64) -> Self {
        Self {
            store,
            dimensions,
            sea_level,
            last_good: Mutex::new(LastGood::default()),
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Run one pass: read, normalize, unify, project, write back
    ///
    /// Never fails as a whole. Read and write errors are reported per
    /// document; a document that could not be read is not written, and its
    /// contents from the last pass that read it stand in for it.
    pub fn merge(&self, allocator: &mut IdAllocator) -> MergeOutcome {
        let mut markers = self.load_all::<MarkerDocument>();
        let players = self.load_all::<PlayerDocument>();

        // Every existing id must be known before any new one is issued.
        for (_, loaded) in &markers {
            if let Ok(loaded) = loaded {
                for (_, id, _) in loaded.document.iter_markers() {
                    allocator.observe(id);
                }
            }
        }

        let mut rekeyed = 0;
        for (dimension, loaded) in &mut markers {
            if let Ok(loaded) = loaded {
                rekeyed += normalize_markers(dimension, &mut loaded.document, self.sea_level, allocator);
            }
        }

        let mut last_good = self.last_good.lock().unwrap_or_else(PoisonError::into_inner);
        remember(&mut last_good.markers, &markers);
        remember(&mut last_good.players, &players);

        let union = unify_markers(stand_ins(&markers, &last_good.markers), self.sea_level);
        let online = unify_players(stand_ins(&players, &last_good.players));
        drop(last_good);

        let mut reports = Vec::with_capacity(self.dimensions.len());
        for ((dimension, marker_doc), (_, player_doc)) in markers.into_iter().zip(players) {
            let markers = match marker_doc {
                Ok(loaded) => {
                    let projected = project_markers(&union.categories, &dimension);
                    self.write_if_changed(&dimension, &loaded, &projected)
                }
                Err(e) => DocumentOutcome::ReadFailed(e),
            };
            let players = match player_doc {
                Ok(loaded) => {
                    let projected = project_players(&online, &dimension, &loaded.document);
                    self.write_if_changed(&dimension, &loaded, &projected)
                }
                Err(e) => DocumentOutcome::ReadFailed(e),
            };
            reports.push(DimensionReport {
                dimension,
                markers,
                players,
            });
        }

        MergeOutcome {
            view: UnifiedView {
                dimensions: self.dimensions.clone(),
                categories: union.categories,
                players: online,
                collisions: union.collisions,
            },
            reports,
            rekeyed,
            stale: union.stale,
        }
    }

    /// Unify the documents as they are on disk, without writing anything
    ///
    /// Nothing is re-keyed and the allocator is not touched. Unreadable
    /// documents are left out.
    pub fn view(&self) -> UnifiedView {
        let markers = self.load_all::<MarkerDocument>();
        let players = self.load_all::<PlayerDocument>();
        let union = unify_markers(
            markers
                .iter()
                .filter_map(|(d, l)| l.as_ref().ok().map(|l| (d, &l.document))),
            self.sea_level,
        );
        let online = unify_players(
            players
                .iter()
                .filter_map(|(d, l)| l.as_ref().ok().map(|l| (d, &l.document))),
        );
        UnifiedView {
            dimensions: self.dimensions.clone(),
            categories: union.categories,
            players: online,
            collisions: union.collisions,
        }
    }

    fn load_all<D: Document>(&self) -> Vec<(Dimension, StorageResult<Loaded<D>>)> {
        self.dimensions
            .iter()
            .map(|dimension| {
                let loaded = self.store.load::<D>(dimension);
                if let Err(e) = &loaded {
                    warn!(dimension = %dimension, kind = %D::KIND, error = %e, "read failed, skipping document this cycle");
                }
                (dimension.clone(), loaded)
            })
            .collect()
    }

    fn write_if_changed<D: Document>(
        &self,
        dimension: &Dimension,
        loaded: &Loaded<D>,
        document: &D,
    ) -> DocumentOutcome {
        let result = loaded.unchanged(document).and_then(|unchanged| {
            if unchanged {
                return Ok(false);
            }
            self.store.write(dimension, document).map(|()| true)
        });
        match result {
            Ok(true) => DocumentOutcome::Written(loaded.state),
            Ok(false) => {
                debug!(dimension = %dimension, kind = %D::KIND, "document unchanged");
                DocumentOutcome::Unchanged
            }
            Err(e) => {
                warn!(dimension = %dimension, kind = %D::KIND, error = %e, "write failed");
                DocumentOutcome::WriteFailed(e)
            }
        }
    }
}

fn remember<D: Clone>(
    last_good: &mut HashMap<Dimension, D>,
    loaded: &[(Dimension, StorageResult<Loaded<D>>)],
) {
    for (dimension, result) in loaded {
        if let Ok(loaded) = result {
            last_good.insert(dimension.clone(), loaded.document.clone());
        }
    }
}

/// Each dimension's document as read, or its last good copy when the read
/// failed. Dimensions never read successfully are left out.
fn stand_ins<'a, D>(
    loaded: &'a [(Dimension, StorageResult<Loaded<D>>)],
    last_good: &'a HashMap<Dimension, D>,
) -> impl Iterator<Item = (&'a Dimension, &'a D)> {
    loaded.iter().filter_map(move |(dimension, result)| match result {
        Ok(loaded) => Some((dimension, &loaded.document)),
        Err(_) => last_good.get(dimension).map(|document| (dimension, document)),
    })
}
