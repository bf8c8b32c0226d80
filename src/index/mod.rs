//! Marker search over the unified view
//!
//! The index is rebuilt after every merge pass into a fresh
//! [`IndexSnapshot`] and swapped in atomically. Readers load the current
//! snapshot without locking and never observe a half-built index.

mod id;
mod label;

pub use id::IdIndex;
pub use label::LabelIndex;

use crate::merge::UnifiedView;
use crate::model::{CategoryId, Dimension, MarkerId, Position};
use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A search hit: where a marker lives and what it is called
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRef {
    pub id: MarkerId,
    pub category_id: CategoryId,
    pub category_label: String,
    pub dimension: Dimension,
    pub label: String,
    pub position: Position,
}

/// Immutable index over one unified view
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    markers: Vec<MarkerRef>,
    labels: LabelIndex,
    ids: IdIndex,
    categories: HashMap<CategoryId, Vec<usize>>,
}

impl IndexSnapshot {
    pub fn build(view: &UnifiedView) -> Self {
        let rank: HashMap<&Dimension, usize> = view
            .dimensions
            .iter()
            .enumerate()
            .map(|(i, d)| (d, i))
            .collect();

        let mut snapshot = Self::default();
        for (category_id, category, marker) in view.iter_markers() {
            let slot = snapshot.markers.len();
            // Dimensions missing from the configured order lose every tie.
            let dim_rank = rank.get(&marker.origin).copied().unwrap_or(usize::MAX);
            snapshot.ids.insert(&marker.id, slot, dim_rank);
            snapshot
                .categories
                .entry(category_id.clone())
                .or_default()
                .push(slot);
            snapshot.markers.push(MarkerRef {
                id: marker.id.clone(),
                category_id: category_id.clone(),
                category_label: category.meta.label.clone(),
                dimension: marker.origin.clone(),
                label: marker.entry.label.clone(),
                position: marker.position,
            });
        }
        snapshot.labels = LabelIndex::build(snapshot.markers.iter().map(|m| m.label.as_str()));
        snapshot
    }

    fn collect(&self, slots: impl IntoIterator<Item = usize>) -> Vec<MarkerRef> {
        slots
            .into_iter()
            .filter_map(|slot| self.markers.get(slot).cloned())
            .collect()
    }

    /// Markers whose label equals or contains `query`, ignoring case
    pub fn find_by_name(&self, query: &str) -> Vec<MarkerRef> {
        self.collect(self.labels.matching(query))
    }

    /// Markers whose label equals `query`, ignoring case
    pub fn find_exact(&self, query: &str) -> Vec<MarkerRef> {
        self.collect(self.labels.exact(query).iter().copied())
    }

    pub fn find_by_id(&self, id: &MarkerId) -> Option<MarkerRef> {
        self.ids.get(id).and_then(|slot| self.markers.get(slot).cloned())
    }

    pub fn markers_in_category(&self, category_id: &str) -> Vec<MarkerRef> {
        match self.categories.get(category_id) {
            Some(slots) => self.collect(slots.iter().copied()),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Lock-free handle to the current snapshot
pub struct SearchIndex {
    snap: ArcSwap<IndexSnapshot>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self {
            snap: ArcSwap::from_pointee(IndexSnapshot::default()),
        }
    }

    /// Replace the current snapshot with one built from `view`
    pub fn rebuild(&self, view: &UnifiedView) {
        let snap = IndexSnapshot::build(view);
        tracing::debug!(markers = snap.len(), "search index rebuilt");
        self.snap.store(Arc::new(snap));
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snap.load_full()
    }

    pub fn find_by_name(&self, query: &str) -> Vec<MarkerRef> {
        self.snap.load().find_by_name(query)
    }

    pub fn find_exact(&self, query: &str) -> Vec<MarkerRef> {
        self.snap.load().find_exact(query)
    }

    pub fn find_by_id(&self, id: &MarkerId) -> Option<MarkerRef> {
        self.snap.load().find_by_id(id)
    }

    pub fn markers_in_category(&self, category_id: &str) -> Vec<MarkerRef> {
        self.snap.load().markers_in_category(category_id)
    }

    pub fn len(&self) -> usize {
        self.snap.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snap.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{UnifiedCategory, UnifiedMarker};
    use crate::model::{MarkerCategory, MarkerEntry};
    use indexmap::IndexMap;

    fn marker(id: &str, label: &str, origin: &str) -> UnifiedMarker {
        let position = Position::new(1.0, 64.0, 1.0);
        UnifiedMarker {
            id: MarkerId::from(id),
            origin: Dimension::from(origin),
            position,
            entry: MarkerEntry::new(label, position).with_origin(Dimension::from(origin)),
        }
    }

    fn view() -> UnifiedView {
        let mut categories = IndexMap::new();
        categories.insert(
            "cities".to_string(),
            UnifiedCategory {
                meta: MarkerCategory::new("Cities"),
                defined_by: Dimension::from("world"),
                markers: vec![
                    marker("marker_1", "Harbor", "world"),
                    marker("marker_3", "Nether Harbor", "world_nether"),
                ],
            },
        );
        categories.insert(
            "portals".to_string(),
            UnifiedCategory {
                meta: MarkerCategory::new("Portals"),
                defined_by: Dimension::from("world_nether"),
                markers: vec![marker("marker_3", "Gate", "world")],
            },
        );
        UnifiedView {
            dimensions: vec![Dimension::from("world"), Dimension::from("world_nether")],
            categories,
            players: Vec::new(),
            collisions: Vec::new(),
        }
    }

    #[test]
    fn empty_index_finds_nothing() {
        let index = SearchIndex::new();
        assert!(index.is_empty());
        assert!(index.find_by_name("harbor").is_empty());
        assert!(index.find_by_id(&MarkerId::from("marker_1")).is_none());
    }

    #[test]
    fn name_search_follows_view_order() {
        let index = SearchIndex::new();
        index.rebuild(&view());

        let hits = index.find_by_name("HARBOR");
        let labels: Vec<_> = hits.iter().map(|h| h.label.as_str()).collect();
        assert_eq!(labels, vec!["Harbor", "Nether Harbor"]);
        assert_eq!(hits[0].category_label, "Cities");

        let exact = index.find_exact("harbor");
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id.as_str(), "marker_1");
    }

    #[test]
    fn id_collision_resolves_to_first_dimension() {
        let index = SearchIndex::new();
        index.rebuild(&view());

        let hit = index.find_by_id(&MarkerId::from("marker_3")).unwrap();
        assert_eq!(hit.dimension, Dimension::from("world"));
        assert_eq!(hit.category_id, "portals");
    }

    #[test]
    fn category_listing_and_rebuild_replace_snapshot() {
        let index = SearchIndex::new();
        index.rebuild(&view());
        let before = index.snapshot();
        assert_eq!(index.markers_in_category("cities").len(), 2);
        assert!(index.markers_in_category("mines").is_empty());

        index.rebuild(&UnifiedView::default());
        assert!(index.is_empty());
        // A reader holding the old snapshot keeps a consistent view.
        assert_eq!(before.len(), 3);
    }
}
