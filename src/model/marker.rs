//! Point-of-interest markers and their categories

use super::dimension::Dimension;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of a category within a marker document
pub type CategoryId = String;

/// Identifier of a marker, unique within its category
///
/// Allocated identifiers have the form `marker_<N>`. Keys of any other shape
/// are accepted on read and treated as unassigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(String);

impl MarkerId {
    pub const PREFIX: &'static str = "marker_";

    /// Build the identifier for an allocator sequence number
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("{}{}", Self::PREFIX, n))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Numeric suffix of an allocated identifier, `None` for any other key
    pub fn sequence(&self) -> Option<u64> {
        let digits = self.0.strip_prefix(Self::PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn is_assigned(&self) -> bool {
        self.sequence().is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A fully resolved world position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Marker position as stored; height may be missing in hand-written documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerPosition {
    #[serde(default)]
    pub x: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: f64,
}

impl MarkerPosition {
    /// Resolve the position, substituting `sea_level` for a missing height
    pub fn resolve(&self, sea_level: f64) -> Position {
        Position::new(self.x, self.y.unwrap_or(sea_level), self.z)
    }
}

impl From<Position> for MarkerPosition {
    fn from(p: Position) -> Self {
        Self {
            x: p.x,
            y: Some(p.y),
            z: p.z,
        }
    }
}

/// Icon anchor offset in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Default for Anchor {
    fn default() -> Self {
        Self { x: 16.0, y: 16.0 }
    }
}

fn default_marker_type() -> String {
    "poi".to_string()
}

fn default_true() -> bool {
    true
}

fn default_marker_sorting() -> i64 {
    100
}

fn default_min_distance() -> f64 {
    10.0
}

fn default_max_distance() -> f64 {
    100_000.0
}

/// A single point-of-interest marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerEntry {
    #[serde(rename = "type", default = "default_marker_type")]
    pub marker_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub position: MarkerPosition,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default = "default_marker_sorting")]
    pub sorting: i64,
    #[serde(default = "default_true")]
    pub listed: bool,
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    /// Dimension whose document introduced this marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_dimension: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    /// Fields this engine does not interpret, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarkerEntry {
    /// Create a point-of-interest marker with default presentation settings
    pub fn new(label: impl Into<String>, position: Position) -> Self {
        Self {
            marker_type: default_marker_type(),
            label: label.into(),
            position: position.into(),
            anchor: Anchor::default(),
            icon: None,
            sorting: default_marker_sorting(),
            listed: true,
            min_distance: default_min_distance(),
            max_distance: default_max_distance(),
            origin_dimension: None,
            original_name: None,
            original_id: None,
            category_name: None,
            extra: Map::new(),
        }
    }

    pub fn with_origin(mut self, dimension: Dimension) -> Self {
        self.origin_dimension = Some(dimension);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Origin tag, or `fallback` when the marker has none yet
    pub fn origin_or<'a>(&'a self, fallback: &'a Dimension) -> &'a Dimension {
        self.origin_dimension.as_ref().unwrap_or(fallback)
    }
}

/// A named, ordered grouping of markers within one dimension's document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerCategory {
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_true")]
    pub toggleable: bool,
    #[serde(default)]
    pub default_hidden: bool,
    #[serde(default)]
    pub sorting: i64,
    #[serde(default)]
    pub markers: IndexMap<MarkerId, MarkerEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarkerCategory {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            toggleable: true,
            default_hidden: false,
            sorting: 0,
            markers: IndexMap::new(),
            extra: Map::new(),
        }
    }

    /// Label given to a category created implicitly by a marker insertion
    pub fn implicit(id: &str) -> Self {
        Self::new(format!("Category {}", id))
    }

    /// Copy of the category's metadata with no markers
    pub fn metadata(&self) -> Self {
        Self {
            label: self.label.clone(),
            toggleable: self.toggleable,
            default_hidden: self.default_hidden,
            sorting: self.sorting,
            markers: IndexMap::new(),
            extra: self.extra.clone(),
        }
    }

    /// Icon used for markers of `category_id` that do not name one
    pub fn default_icon(category_id: &str) -> String {
        format!("assets/{}.png", category_id)
    }
}

/// A dimension's marker document: `categoryId -> category`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerDocument {
    pub categories: IndexMap<CategoryId, MarkerCategory>,
}

impl MarkerDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_count(&self) -> usize {
        self.categories.values().map(|c| c.markers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Get a category, creating it with an implicit label if absent
    pub fn category_mut_or_insert(&mut self, id: &str) -> &mut MarkerCategory {
        self.categories
            .entry(id.to_string())
            .or_insert_with(|| MarkerCategory::implicit(id))
    }

    /// Locate a marker by id in any category
    pub fn find(&self, id: &MarkerId) -> Option<(&CategoryId, &MarkerEntry)> {
        self.categories
            .iter()
            .find_map(|(cid, cat)| cat.markers.get(id).map(|m| (cid, m)))
    }

    /// Remove a marker from whichever category holds it
    pub fn remove(&mut self, id: &MarkerId) -> Option<MarkerEntry> {
        self.categories
            .values_mut()
            .find_map(|cat| cat.markers.shift_remove(id))
    }

    /// Iterate `(categoryId, markerId, entry)` in document order
    pub fn iter_markers(&self) -> impl Iterator<Item = (&CategoryId, &MarkerId, &MarkerEntry)> {
        self.categories
            .iter()
            .flat_map(|(cid, cat)| cat.markers.iter().map(move |(mid, m)| (cid, mid, m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_parses_allocated_ids_only() {
        assert_eq!(MarkerId::from("marker_12").sequence(), Some(12));
        assert_eq!(MarkerId::from_sequence(7).as_str(), "marker_7");
        assert_eq!(MarkerId::from("marker_").sequence(), None);
        assert_eq!(MarkerId::from("marker_+3").sequence(), None);
        assert_eq!(MarkerId::from("city_3_0").sequence(), None);
        assert!(!MarkerId::from("marker_x1").is_assigned());
    }

    #[test]
    fn missing_height_resolves_to_sea_level() {
        let pos = MarkerPosition { x: 1.5, y: None, z: -3.0 };
        assert_eq!(pos.resolve(64.0), Position::new(1.5, 64.0, -3.0));

        let pos = MarkerPosition { x: 0.0, y: Some(12.25), z: 0.0 };
        assert_eq!(pos.resolve(64.0).y, 12.25);
    }

    #[test]
    fn implicit_category_is_created_once() {
        let mut doc = MarkerDocument::new();
        doc.category_mut_or_insert("cities").label = "Cities".into();
        doc.category_mut_or_insert("cities");
        assert_eq!(doc.categories.len(), 1);
        assert_eq!(doc.categories["cities"].label, "Cities");
        assert_eq!(MarkerCategory::implicit("towns").label, "Category towns");
    }

    #[test]
    fn remove_keeps_empty_category() {
        let mut doc = MarkerDocument::new();
        doc.category_mut_or_insert("cities")
            .markers
            .insert(MarkerId::from("marker_1"), MarkerEntry::new("A", Position::default()));

        assert!(doc.remove(&MarkerId::from("marker_1")).is_some());
        assert!(doc.remove(&MarkerId::from("marker_1")).is_none());
        assert!(doc.categories.contains_key("cities"));
        assert_eq!(doc.marker_count(), 0);
    }
}
