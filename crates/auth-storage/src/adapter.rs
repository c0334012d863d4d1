//! Storage capability definition.

use crate::StorageResult;

/// Capability trait for durable key/value persistence.
///
/// Implementations must be usable before any UI exists and must
/// guarantee read-after-write within the same process. A write either
/// succeeds or returns an error; it never silently drops the value.
pub trait StorageAdapter: Send + Sync {
    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value, reporting whether it was present
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
