//! Case-insensitive label lookup

use std::collections::HashMap;

fn fold(label: &str) -> String {
    label.to_lowercase()
}

/// Folded labels by position in the snapshot, plus an exact-match map
#[derive(Debug, Default)]
pub struct LabelIndex {
    folded: Vec<String>,
    exact: HashMap<String, Vec<usize>>,
}

impl LabelIndex {
    pub fn build<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = Self::default();
        for (slot, label) in labels.into_iter().enumerate() {
            let folded = fold(label);
            index.exact.entry(folded.clone()).or_default().push(slot);
            index.folded.push(folded);
        }
        index
    }

    /// Slots whose label equals `query`, ignoring case
    pub fn exact(&self, query: &str) -> &[usize] {
        self.exact
            .get(&fold(query))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Slots whose label contains `query`, ignoring case, in slot order
    ///
    /// An empty or all-whitespace query matches nothing.
    pub fn matching(&self, query: &str) -> Vec<usize> {
        let query = fold(query.trim());
        if query.is_empty() {
            return Vec::new();
        }
        self.folded
            .iter()
            .enumerate()
            .filter(|(_, label)| label.contains(&query))
            .map(|(slot, _)| slot)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.folded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive_and_ordered() {
        let index = LabelIndex::build(["Северный порт", "Harbor", "Old HARBOR gate", "Mill"]);
        assert_eq!(index.matching("harbor"), vec![1, 2]);
        assert_eq!(index.matching("ПОРТ"), vec![0]);
        assert!(index.matching("castle").is_empty());
    }

    #[test]
    fn empty_query_matches_nothing() {
        let index = LabelIndex::build(["Harbor"]);
        assert!(index.matching("").is_empty());
        assert!(index.matching("   ").is_empty());
    }

    #[test]
    fn exact_lookup_collects_duplicates() {
        let index = LabelIndex::build(["Spawn", "spawn", "Spawn point"]);
        assert_eq!(index.exact("SPAWN"), &[0, 1]);
        assert!(index.exact("spa").is_empty());
    }
}
