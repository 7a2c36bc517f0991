//! Identity-keyed snapshot cache
//!
//! One store per tracked scope. Entries are keyed by [`VariableId`] so that
//! a rename stays a single logical variable.

use std::collections::BTreeMap;

use super::scope::VariableId;

/// Last observed key and value of one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowEntry {
    pub key: String,
    pub value: String,
}

/// Shadow copies for every variable seen in the last `track()` of a scope.
///
/// Ids are allocated monotonically, so iteration order is creation order.
#[derive(Debug, Default)]
pub struct ShadowStore {
    entries: BTreeMap<VariableId, ShadowEntry>,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: VariableId) -> Option<&ShadowEntry> {
        self.entries.get(&id)
    }

    /// Overwrite the shadow for `id`, returning the previous entry
    pub fn record(&mut self, id: VariableId, key: &str, value: &str) -> Option<ShadowEntry> {
        self.entries.insert(
            id,
            ShadowEntry {
                key: key.to_string(),
                value: value.to_string(),
            },
        )
    }

    /// Remove and return every entry whose id fails `keep`
    pub fn evict_unless<F>(&mut self, mut keep: F) -> Vec<(VariableId, ShadowEntry)>
    where
        F: FnMut(VariableId) -> bool,
    {
        let stale: Vec<VariableId> = self.entries.keys().copied().filter(|id| !keep(*id)).collect();
        stale
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|entry| (id, entry)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_returns_previous() {
        let mut store = ShadowStore::new();
        let id = VariableId::next();

        assert!(store.record(id, "a", "1").is_none());
        let prev = store.record(id, "a", "2").unwrap();
        assert_eq!(prev.value, "1");
        assert_eq!(store.get(id).unwrap().value, "2");
    }

    #[test]
    fn test_evict_keeps_creation_order() {
        let mut store = ShadowStore::new();
        let a = VariableId::next();
        let b = VariableId::next();
        let c = VariableId::next();
        store.record(c, "c", "3");
        store.record(a, "a", "1");
        store.record(b, "b", "2");

        let evicted = store.evict_unless(|id| id == b);
        let keys: Vec<_> = evicted.iter().map(|(_, e)| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(store.len(), 1);
    }
}
