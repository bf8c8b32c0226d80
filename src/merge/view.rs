//! The transient unified view built during one merge cycle

use crate::model::{CategoryId, Dimension, MarkerCategory, MarkerEntry, MarkerId, PlayerEntry, Position};
use indexmap::IndexMap;

/// A marker together with the dimension that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedMarker {
    pub id: MarkerId,
    pub origin: Dimension,
    /// Position with the height resolved
    pub position: Position,
    pub entry: MarkerEntry,
}

/// A category across all dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedCategory {
    /// Metadata from the first dimension that defines the category (no markers)
    pub meta: MarkerCategory,
    pub defined_by: Dimension,
    /// Markers of every dimension, in dimension order then document order
    pub markers: Vec<UnifiedMarker>,
}

/// The same marker id owned by more than one dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub id: MarkerId,
    /// Where the id was first seen; this copy answers id lookups
    pub kept: (CategoryId, Dimension),
    pub also: (CategoryId, Dimension),
}

/// Merged markers and players of all configured dimensions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedView {
    /// Configured dimensions, in tie-break order
    pub dimensions: Vec<Dimension>,
    pub categories: IndexMap<CategoryId, UnifiedCategory>,
    /// Online players, each tagged with its origin dimension
    pub players: Vec<PlayerEntry>,
    pub collisions: Vec<Collision>,
}

impl UnifiedView {
    pub fn marker_count(&self) -> usize {
        self.categories.values().map(|c| c.markers.len()).sum()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Iterate `(categoryId, category, marker)` in view order
    pub fn iter_markers(&self) -> impl Iterator<Item = (&CategoryId, &UnifiedCategory, &UnifiedMarker)> {
        self.categories
            .iter()
            .flat_map(|(cid, cat)| cat.markers.iter().map(move |m| (cid, cat, m)))
    }
}
