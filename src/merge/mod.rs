//! Cross-dimension merge
//!
//! Each dimension's marker document is the source of truth for the markers
//! it owns (their `originDimension`). A merge pass unifies all documents into
//! a [`UnifiedView`] and writes each dimension back with every category but
//! only its own markers, and with the full list of online players.

mod markers;
mod merger;
mod players;
mod view;

pub use markers::{normalize_markers, project_markers, unify_markers, MarkerUnion};
pub use merger::{CrossDimensionMerger, DimensionReport, DocumentOutcome, MergeOutcome};
pub use players::{project_players, unify_players};
pub use view::{Collision, UnifiedCategory, UnifiedMarker, UnifiedView};
