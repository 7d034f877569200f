//! Opaque key/value blob storage used for suite persistence.

use crate::error::EnvError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Key/value store for whole-suite snapshots.
///
/// Writes replace the previous value for a key; there is no partial update.
/// Implementations must be thread-safe.
pub trait BlobStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), EnvError>;

    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EnvError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), EnvError>;
}

/// Volatile store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), EnvError> {
        let mut entries = self.entries.lock()
            .map_err(|_| EnvError::storage("memory store poisoned"))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EnvError> {
        let entries = self.entries.lock()
            .map_err(|_| EnvError::storage("memory store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), EnvError> {
        let mut entries = self.entries.lock()
            .map_err(|_| EnvError::storage("memory store poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}
