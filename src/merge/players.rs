//! Player half of the merge

use crate::model::{Dimension, PlayerDocument, PlayerEntry};
use indexmap::IndexMap;
use tracing::debug;

/// Merge player documents, given in configured dimension order
///
/// Players are keyed by uuid and listed in order of first appearance. A
/// player counts as online only if some document lists it natively (untagged
/// or tagged with that document's own dimension); copies written into other
/// documents by an earlier cycle do not keep a player alive. When a uuid is
/// native to several documents the first one wins. Entries without a uuid
/// are ignored.
pub fn unify_players<'a>(
    documents: impl IntoIterator<Item = (&'a Dimension, &'a PlayerDocument)>,
) -> Vec<PlayerEntry> {
    let mut by_uuid: IndexMap<&str, Option<PlayerEntry>> = IndexMap::new();

    for (dimension, document) in documents {
        for player in &document.players {
            if player.uuid.is_empty() {
                debug!(dimension = %dimension, name = %player.name, "ignoring player without uuid");
                continue;
            }
            let native = player
                .origin_dimension
                .as_ref()
                .map_or(true, |origin| origin == dimension);
            let slot = by_uuid.entry(player.uuid.as_str()).or_insert(None);
            if !native {
                continue;
            }
            match slot {
                Some(kept) => debug!(
                    uuid = %player.uuid,
                    kept_in = ?kept.origin_dimension,
                    also_in = %dimension,
                    "player listed natively twice, keeping first"
                ),
                None => {
                    let mut entry = player.clone();
                    entry.origin_dimension = Some(dimension.clone());
                    entry.foreign = false;
                    *slot = Some(entry);
                }
            }
        }
    }

    by_uuid.into_values().flatten().collect()
}

/// Build `dimension`'s player document
///
/// Every online player is listed; `foreign` marks those located elsewhere.
/// Display settings come from `existing`, the dimension's current document.
pub fn project_players(
    players: &[PlayerEntry],
    dimension: &Dimension,
    existing: &PlayerDocument,
) -> PlayerDocument {
    let projected = players
        .iter()
        .map(|player| {
            let mut entry = player.clone();
            entry.foreign = entry.origin_dimension.as_ref() != Some(dimension);
            entry
        })
        .collect();
    existing.with_players(projected)
}
