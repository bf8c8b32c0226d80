//! Marker half of the merge: normalize, unify, project

use super::view::{Collision, UnifiedCategory, UnifiedMarker};
use crate::allocator::IdAllocator;
use crate::model::{CategoryId, Dimension, MarkerCategory, MarkerDocument, MarkerId};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Result of unifying marker documents
#[derive(Debug, Default)]
pub struct MarkerUnion {
    pub categories: IndexMap<CategoryId, UnifiedCategory>,
    pub collisions: Vec<Collision>,
    /// Copies found outside their origin's document and dropped
    pub stale: usize,
}

/// Prepare one dimension's document for unification
///
/// Tags untagged markers with `dimension`, fills missing heights and icons,
/// and gives unassigned keys of markers native to `dimension` a fresh
/// `marker_<N>` id (the old key is kept in `originalId`). All documents must
/// have been observed by `allocator` before this runs. Returns the number of
/// markers re-keyed.
pub fn normalize_markers(
    dimension: &Dimension,
    document: &mut MarkerDocument,
    sea_level: f64,
    allocator: &mut IdAllocator,
) -> usize {
    let mut rekeyed = 0;
    for (category_id, category) in document.categories.iter_mut() {
        let markers = std::mem::take(&mut category.markers);
        let mut normalized = IndexMap::with_capacity(markers.len());

        for (id, mut entry) in markers {
            if entry.origin_dimension.is_none() {
                entry.origin_dimension = Some(dimension.clone());
            }
            if entry.position.y.is_none() {
                entry.position.y = Some(sea_level);
            }
            if entry.icon.is_none() {
                entry.icon = Some(MarkerCategory::default_icon(category_id));
            }

            let native = entry.origin_dimension.as_ref() == Some(dimension);
            let id = if native && !id.is_assigned() {
                match allocator.next() {
                    Ok(fresh) => {
                        info!(dimension = %dimension, old = %id, new = %fresh, "assigned id to marker");
                        if entry.original_id.is_none() {
                            entry.original_id = Some(id.to_string());
                        }
                        if entry.original_name.is_none() {
                            entry.original_name = Some(entry.label.clone());
                        }
                        rekeyed += 1;
                        fresh
                    }
                    Err(e) => {
                        warn!(dimension = %dimension, id = %id, error = %e, "could not allocate id, keeping key");
                        id
                    }
                }
            } else {
                id
            };
            normalized.insert(id, entry);
        }
        category.markers = normalized;
    }
    rekeyed
}

/// Merge normalized documents, given in configured dimension order
///
/// Only native copies (found in their origin's document) enter the view. A
/// copy anywhere else is a stale echo: either its native copy is already in
/// the view, or its origin no longer has it and it disappears. Category
/// metadata comes from the first document defining the category.
pub fn unify_markers<'a>(
    documents: impl IntoIterator<Item = (&'a Dimension, &'a MarkerDocument)>,
    sea_level: f64,
) -> MarkerUnion {
    let mut union = MarkerUnion::default();
    let mut first_seen: HashMap<MarkerId, (CategoryId, Dimension)> = HashMap::new();

    for (dimension, document) in documents {
        for (category_id, category) in &document.categories {
            let unified = union
                .categories
                .entry(category_id.clone())
                .or_insert_with(|| UnifiedCategory {
                    meta: category.metadata(),
                    defined_by: dimension.clone(),
                    markers: Vec::new(),
                });

            for (id, entry) in &category.markers {
                let origin = entry.origin_or(dimension);
                if origin != dimension {
                    debug!(
                        id = %id,
                        found_in = %dimension,
                        origin = %origin,
                        "dropping copy held outside its origin"
                    );
                    union.stale += 1;
                    continue;
                }

                match first_seen.get(id) {
                    Some(kept) => {
                        warn!(
                            id = %id,
                            kept_in = %kept.1,
                            also_in = %dimension,
                            "marker id owned by more than one dimension"
                        );
                        union.collisions.push(Collision {
                            id: id.clone(),
                            kept: kept.clone(),
                            also: (category_id.clone(), dimension.clone()),
                        });
                    }
                    None => {
                        first_seen.insert(id.clone(), (category_id.clone(), dimension.clone()));
                    }
                }

                let mut entry = entry.clone();
                entry.origin_dimension = Some(dimension.clone());
                unified.markers.push(UnifiedMarker {
                    id: id.clone(),
                    origin: dimension.clone(),
                    position: entry.position.resolve(sea_level),
                    entry,
                });
            }
        }
    }
    union
}

/// Build `dimension`'s marker document from the unified categories
///
/// Every known category is present (possibly empty); only markers owned by
/// `dimension` are included.
pub fn project_markers(
    categories: &IndexMap<CategoryId, UnifiedCategory>,
    dimension: &Dimension,
) -> MarkerDocument {
    let mut document = MarkerDocument::new();
    for (category_id, unified) in categories {
        let mut category = unified.meta.clone();
        for marker in unified.markers.iter().filter(|m| &m.origin == dimension) {
            category.markers.insert(marker.id.clone(), marker.entry.clone());
        }
        document.categories.insert(category_id.clone(), category);
    }
    document
}
