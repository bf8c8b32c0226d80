//! Marker record model: markers, categories, players and the documents that
//! carry them

mod dimension;
mod marker;
mod player;
mod settings;


pub use dimension::{Dimension, DocumentKind};
pub use marker::{
    Anchor, CategoryId, MarkerCategory, MarkerDocument, MarkerEntry, MarkerId, MarkerPosition,
    Position,
};
pub use player::{PlayerDocument, PlayerEntry, PlayerMarkerSet, Rotation};
pub use settings::{LiveFlags, SettingsDocument, StartLocation};
