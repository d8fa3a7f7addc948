//! In-memory watermark store for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StateError;
use crate::WatermarkStore;

/// Volatile store with the same contract as the file-backed one.
#[derive(Default)]
pub struct MemoryWatermarkStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let map = self.map.lock().expect("watermark map poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, marker: &str) -> Result<(), StateError> {
        let mut map = self.map.lock().expect("watermark map poisoned");
        map.insert(key.to_string(), marker.to_string());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>, StateError> {
        let map = self.map.lock().expect("watermark map poisoned");
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_key_is_none() {
        let store = MemoryWatermarkStore::new();
        assert_eq!(store.get("movie").unwrap(), None);
    }

    #[test]
    fn test_set_replaces_previous_marker() {
        let store = MemoryWatermarkStore::new();
        store.set("movie", "a").unwrap();
        store.set("movie", "b").unwrap();
        assert_eq!(store.get("movie").unwrap().as_deref(), Some("b"));
        assert_eq!(store.entries().unwrap().len(), 1);
    }
}
