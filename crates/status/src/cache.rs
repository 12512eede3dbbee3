use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::error::StatusError;

/// Latest known result of every named probe.
///
/// A cheap `Clone` handle: hooks, HTTP handlers and the snapshot timers all
/// share one map and may read and write it concurrently without any locking
/// of their own.
#[derive(Clone, Default)]
pub struct StatusCache {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key` with any serializable value.
    pub fn update<V: Serialize>(&self, key: impl Into<String>, value: V) -> Result<(), StatusError> {
        let value = serde_json::to_value(value)?;
        self.update_value(key, value);
        Ok(())
    }

    /// Insert or overwrite `key` with an already-built JSON value.
    pub fn update_value(&self, key: impl Into<String>, value: Value) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Remove `key`. Removing a missing key is a no-op; returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn num_entries(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Copy of the whole map, ordered by key.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Serialize either the whole map or one key (`null` when absent).
    pub fn to_json(&self, key: Option<&str>) -> Result<String, StatusError> {
        let json = match key {
            Some(key) => serde_json::to_string(&self.get(key).unwrap_or(Value::Null))?,
            None => serde_json::to_string(&self.entries())?,
        };
        Ok(json)
    }
}

impl std::fmt::Debug for StatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCache")
            .field("entries", &self.num_entries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crud() {
        let cache = StatusCache::new();
        cache.update("hello", "kitty").unwrap();
        cache.update("goodbye", "human").unwrap();
        cache.update("blarrgh", "arggh").unwrap();

        assert_eq!(cache.get("hello"), Some(Value::from("kitty")));
        assert_eq!(cache.get("goodbye"), Some(Value::from("human")));
        assert_eq!(cache.num_entries(), 3);

        assert!(cache.delete("blarrgh"));
        assert_eq!(cache.num_entries(), 2);
        assert!(!cache.delete("blarrgh"));
        assert_eq!(cache.num_entries(), 2);

        cache.update("potato", "tomato").unwrap();
        assert_eq!(cache.num_entries(), 3);
        cache.update("potato", "AAARGH").unwrap();
        assert_eq!(cache.num_entries(), 3);
        assert_eq!(cache.get("potato"), Some(Value::from("AAARGH")));
    }

    #[test]
    fn overwrite_keeps_entry_count() {
        let cache = StatusCache::new();
        cache.update("hello", "kitty").unwrap();
        cache.update("goodbye", "human").unwrap();
        assert_eq!(cache.num_entries(), 2);

        cache.update("hello", "dog").unwrap();
        assert_eq!(cache.get("hello"), Some(Value::from("dog")));
        assert_eq!(cache.num_entries(), 2);
    }

    #[test]
    fn missing_key_is_none() {
        let cache = StatusCache::new();
        cache.update("somekey", "hassomething").unwrap();
        assert!(cache.get("somekey").is_some());
        assert!(cache.get("doesntexist").is_none());
    }

    #[test]
    fn clones_share_state() {
        let cache = StatusCache::new();
        let other = cache.clone();
        other.update("shared", 1).unwrap();
        assert_eq!(cache.get("shared"), Some(Value::from(1)));
    }

    #[test]
    fn non_string_map_keys_are_rejected() {
        let cache = StatusCache::new();
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], "x");
        assert!(matches!(cache.update("bad", bad), Err(StatusError::Json(_))));
        assert_eq!(cache.num_entries(), 0);
    }

    #[test]
    fn to_json_whole_map_and_single_key() {
        let cache = StatusCache::new();
        cache.update("b", 2).unwrap();
        cache.update("a", "one").unwrap();

        assert_eq!(cache.to_json(None).unwrap(), r#"{"a":"one","b":2}"#);
        assert_eq!(cache.to_json(Some("b")).unwrap(), "2");
        assert_eq!(cache.to_json(Some("missing")).unwrap(), "null");
        assert_eq!(cache.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = StatusCache::new();
        cache.update("counter", 1).unwrap();

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        cache.update(format!("blargh-{i}-{j}"), j).unwrap();
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let _ = cache.get(&format!("blargh-{i}-{j}"));
                        let _ = cache.to_json(None);
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
        assert_eq!(cache.num_entries(), 16 * 50 + 1);
    }
}
