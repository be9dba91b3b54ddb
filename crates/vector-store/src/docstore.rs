use archrag_chunker::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slot-keyed chunk storage, kept in lockstep with the vector index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentStore {
    entries: BTreeMap<usize, Chunk>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Chunk> {
        self.entries.get(&slot)
    }

    /// Store a chunk at `slot`, returning whatever was there before
    pub fn insert(&mut self, slot: usize, chunk: Chunk) -> Option<Chunk> {
        self.entries.insert(slot, chunk)
    }

    #[must_use]
    pub fn contains(&self, slot: usize) -> bool {
        self.entries.contains_key(&slot)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Chunks in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Chunk)> {
        self.entries.iter().map(|(slot, chunk)| (*slot, chunk))
    }
}

impl FromIterator<(usize, Chunk)> for DocumentStore {
    fn from_iter<T: IntoIterator<Item = (usize, Chunk)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archrag_chunker::Metadata;

    #[test]
    fn test_serializes_as_slot_keyed_object() {
        let store: DocumentStore = [(1, Chunk::new("b".to_string(), Metadata::new()))]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json, serde_json::json!({"1": {"content": "b", "metadata": {}}}));

        let back: DocumentStore = serde_json::from_value(json).unwrap();
        assert_eq!(back.get(1).map(|c| c.content.as_str()), Some("b"));
        assert!(!back.contains(0));
    }
}
