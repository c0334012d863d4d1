//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{StorageAdapter, StorageResult};

/// Process-lifetime storage backed by a map.
///
/// Nothing survives a restart. Used as the test backend throughout the
/// workspace and as a fallback where no durable medium is available.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().expect("lock poisoned");
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().expect("lock poisoned");
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().expect("lock poisoned");
        Ok(data.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let storage = MemoryStorage::new();

        storage.set("accessToken", "tok-123").unwrap();
        assert_eq!(
            storage.get("accessToken").unwrap(),
            Some("tok-123".to_string())
        );
    }

    #[test]
    fn get_missing_key_is_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("nope").unwrap(), None);
    }

    #[test]
    fn remove_reports_presence() {
        let storage = MemoryStorage::new();
        storage.set("user", "{}").unwrap();

        assert!(storage.remove("user").unwrap());
        assert!(!storage.remove("user").unwrap());
        assert_eq!(storage.get("user").unwrap(), None);
    }

    #[test]
    fn has_uses_default_impl() {
        let storage = MemoryStorage::new();
        assert!(!storage.has("rememberMe").unwrap());

        storage.set("rememberMe", "true").unwrap();
        assert!(storage.has("rememberMe").unwrap());
    }

    #[test]
    fn overwrite_replaces_value() {
        let storage = MemoryStorage::new();
        storage.set("k", "v1").unwrap();
        storage.set("k", "v2").unwrap();

        assert_eq!(storage.get("k").unwrap(), Some("v2".to_string()));
        assert_eq!(storage.len(), 1);
    }
}
