//! Concurrent key-value cache, the queryable view of current state.
//!
//! A single mutex guards the backing map. Every operation copies in or out
//! under that lock, so readers never observe a half-applied mutation and
//! snapshots are not live views. Each entry carries the record filename it
//! was persisted under, which is what lets removal and rename reach the
//! matching on-disk record without inverting the key function.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Entry<V> {
    file_name: String,
    value: V,
}

/// In-memory key -> value mapping guarded by one lock.
pub struct Cache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or replace the entry for a key.
    pub fn insert(&self, key: K, file_name: String, value: V) {
        self.entries.lock().insert(key, Entry { file_name, value });
    }

    /// Remove a key, returning the record filename it was stored under.
    pub fn remove(&self, key: &K) -> Option<String> {
        self.entries.lock().remove(key).map(|e| e.file_name)
    }

    /// Move an entry from one key to another, carrying the value unchanged.
    ///
    /// Any existing entry under the destination key is overwritten (new
    /// file wins). Returns false when the old key is absent.
    pub fn rename(&self, old_key: &K, new_key: K, new_file_name: String) -> bool {
        let mut entries = self.entries.lock();
        match entries.remove(old_key) {
            Some(entry) => {
                entries.insert(
                    new_key,
                    Entry {
                        file_name: new_file_name,
                        value: entry.value,
                    },
                );
                true
            }
            None => false,
        }
    }

    /// Point lookup; `None` signals absence.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).map(|e| e.value.clone())
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Snapshot of all keys.
    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Snapshot of all values.
    pub fn values(&self) -> Vec<V> {
        self.entries.lock().values().map(|e| e.value.clone()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every key not in `existing`, returning the record filenames of
    /// the removed entries.
    pub fn retain(&self, existing: &HashSet<K>) -> Vec<String> {
        let mut entries = self.entries.lock();
        let stale: Vec<K> = entries
            .keys()
            .filter(|k| !existing.contains(*k))
            .cloned()
            .collect();

        stale
            .into_iter()
            .filter_map(|k| entries.remove(&k).map(|e| e.file_name))
            .collect()
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(entries: &[(&str, u32)]) -> Cache<String, u32> {
        let cache = Cache::new();
        for (name, value) in entries {
            cache.insert(name.to_string(), name.to_string(), *value);
        }
        cache
    }

    #[test]
    fn test_insert_get_remove() {
        let cache = cache_with(&[("a.txt", 1)]);

        assert_eq!(cache.get(&"a.txt".to_string()), Some(1));
        assert_eq!(cache.remove(&"a.txt".to_string()), Some("a.txt".to_string()));
        assert_eq!(cache.get(&"a.txt".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_replaces() {
        let cache = cache_with(&[("a.txt", 1)]);
        cache.insert("a.txt".to_string(), "a.txt".to_string(), 2);

        assert_eq!(cache.get(&"a.txt".to_string()), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rename_carries_value() {
        let cache = cache_with(&[("a.txt", 7)]);

        let moved = cache.rename(&"a.txt".to_string(), "b.txt".to_string(), "b.txt".to_string());

        assert!(moved);
        assert_eq!(cache.get(&"a.txt".to_string()), None);
        assert_eq!(cache.get(&"b.txt".to_string()), Some(7));
    }

    #[test]
    fn test_rename_overwrites_destination() {
        let cache = cache_with(&[("a.txt", 1), ("b.txt", 2)]);

        cache.rename(&"a.txt".to_string(), "b.txt".to_string(), "b.txt".to_string());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"b.txt".to_string()), Some(1));
    }

    #[test]
    fn test_rename_missing_key() {
        let cache: Cache<String, u32> = Cache::new();
        assert!(!cache.rename(&"a.txt".to_string(), "b.txt".to_string(), "b.txt".to_string()));
    }

    #[test]
    fn test_retain_drops_stale_keys() {
        let cache = cache_with(&[("a.txt", 1), ("b.txt", 2), ("c.txt", 3)]);

        let existing: HashSet<String> = ["a.txt".to_string()].into_iter().collect();
        let mut removed = cache.retain(&existing);
        removed.sort();

        assert_eq!(removed, vec!["b.txt".to_string(), "c.txt".to_string()]);
        assert_eq!(cache.keys(), vec!["a.txt".to_string()]);
    }

    #[test]
    fn test_snapshots_are_not_live() {
        let cache = cache_with(&[("a.txt", 1)]);
        let keys = cache.keys();

        cache.insert("b.txt".to_string(), "b.txt".to_string(), 2);

        assert_eq!(keys.len(), 1);
        assert_eq!(cache.len(), 2);
    }
}
