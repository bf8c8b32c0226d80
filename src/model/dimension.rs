//! Dimension tags and document addressing

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A world partition (e.g. `world`, `world_nether`, `world_the_end`)
///
/// The same string is used as the origin tag written into entries and as the
/// directory name of the dimension's documents. Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(String);

impl Dimension {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Dimension {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Dimension {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The kinds of per-dimension documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Markers,
    Players,
    Settings,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [Self::Markers, Self::Players, Self::Settings];

    /// File name of the document inside its directory
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Markers => "markers.json",
            Self::Players => "players.json",
            Self::Settings => "settings.json",
        }
    }

    /// Whether the document lives in the dimension's `live/` subdirectory
    pub fn is_live(self) -> bool {
        matches!(self, Self::Markers | Self::Players)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markers => "markers",
            Self::Players => "players",
            Self::Settings => "settings",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markers" => Ok(Self::Markers),
            "players" => Ok(Self::Players),
            "settings" => Ok(Self::Settings),
            other => Err(format!(
                "unknown document kind '{}' (expected markers, players or settings)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Markers".parse::<DocumentKind>(), Ok(DocumentKind::Markers));
        assert_eq!(" players ".parse::<DocumentKind>(), Ok(DocumentKind::Players));
        assert!("tiles".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn only_settings_live_outside_live_dir() {
        let live: Vec<_> = DocumentKind::ALL.iter().filter(|k| k.is_live()).collect();
        assert_eq!(live, vec![&DocumentKind::Markers, &DocumentKind::Players]);
    }

    #[test]
    fn dimension_serializes_as_string() {
        let json = serde_json::to_string(&Dimension::from("world_nether")).unwrap();
        assert_eq!(json, "\"world_nether\"");
    }
}
