//! Per-dimension map settings document

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StartLocation {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub z: f64,
}

/// Which live documents the map viewer polls
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveFlags {
    #[serde(default)]
    pub markers: bool,
    #[serde(default)]
    pub players: bool,
}

/// Map settings; fields not modelled here pass through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<StartLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<LiveFlags>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SettingsDocument {
    /// True when the viewer is told to poll both live documents
    pub fn live_enabled(&self) -> bool {
        self.live.map(|l| l.markers && l.players).unwrap_or(false)
    }
}
