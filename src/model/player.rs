//! Online players and the per-dimension player document

use super::dimension::Dimension;
use super::marker::Position;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub roll: f64,
}

/// A player currently online in some dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    /// True when the player is in a dimension other than the document's own
    #[serde(default)]
    pub foreign: bool,
    /// Absent on entries written by the game side; set by the merger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_dimension: Option<Dimension>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerEntry {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, position: Position) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            foreign: false,
            origin_dimension: None,
            position,
            rotation: Rotation::default(),
            extra: Map::new(),
        }
    }

    pub fn with_origin(mut self, dimension: Dimension) -> Self {
        self.origin_dimension = Some(dimension);
        self
    }
}

/// Marker set the map viewer groups player markers under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMarkerSet {
    pub id: String,
    pub label: String,
    pub toggleable: bool,
    pub default_hidden: bool,
    pub priority: i64,
}

impl Default for PlayerMarkerSet {
    fn default() -> Self {
        Self {
            id: "players".to_string(),
            label: "Players".to_string(),
            toggleable: true,
            default_hidden: false,
            priority: 1000,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_update_interval() -> u64 {
    1000
}

fn default_marker_set_id() -> String {
    "players".to_string()
}

/// A dimension's player document
///
/// Only `players` is rewritten by a sync cycle; the display settings are kept
/// as the dimension's document has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDocument {
    #[serde(default)]
    pub players: Vec<PlayerEntry>,
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    #[serde(default = "default_true")]
    pub show_player_markers: bool,
    #[serde(default = "default_true")]
    pub show_player_body: bool,
    #[serde(default = "default_true")]
    pub show_player_head: bool,
    #[serde(default = "default_true")]
    pub show_label_background: bool,
    #[serde(default = "default_marker_set_id")]
    pub marker_set_id: String,
    #[serde(default)]
    pub marker_set: PlayerMarkerSet,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PlayerDocument {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            update_interval: default_update_interval(),
            show_player_markers: true,
            show_player_body: true,
            show_player_head: true,
            show_label_background: true,
            marker_set_id: default_marker_set_id(),
            marker_set: PlayerMarkerSet::default(),
            extra: Map::new(),
        }
    }
}

impl PlayerDocument {
    /// Same settings, different player list
    pub fn with_players(&self, players: Vec<PlayerEntry>) -> Self {
        Self {
            players,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_players_list_gets_default_settings() {
        let doc: PlayerDocument = serde_json::from_str(r#"{"players": []}"#).unwrap();
        assert_eq!(doc, PlayerDocument::default());
    }

    #[test]
    fn with_players_keeps_settings() {
        let mut doc = PlayerDocument::default();
        doc.update_interval = 250;
        let next = doc.with_players(vec![PlayerEntry::new("u1", "Steve", Position::default())]);
        assert_eq!(next.update_interval, 250);
        assert_eq!(next.players.len(), 1);
    }
}
