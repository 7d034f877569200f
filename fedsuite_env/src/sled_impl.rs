//! Persistent implementation of `BlobStore` using sled.

use crate::blob::BlobStore;
use crate::error::EnvError;
use std::path::Path;

/// Sled-based persistent blob store.
///
/// Uses an embedded key-value database for durability. Every write is
/// flushed before returning.
pub struct SledBlobStore {
    db: sled::Db,
}

impl SledBlobStore {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EnvError> {
        let db = sled::open(path)
            .map_err(|e| EnvError::storage(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Create a temporary store, removed on drop
    pub fn open_temp() -> Result<Self, EnvError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()
            .map_err(|e| EnvError::storage(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }
}

impl BlobStore for SledBlobStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), EnvError> {
        self.db.insert(key.as_bytes(), value)
            .map_err(|e| EnvError::storage(format!("Insert failed: {}", e)))?;
        self.db.flush()
            .map_err(|e| EnvError::storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EnvError> {
        let value = self.db.get(key.as_bytes())
            .map_err(|e| EnvError::storage(format!("Read failed: {}", e)))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn remove(&self, key: &str) -> Result<(), EnvError> {
        self.db.remove(key.as_bytes())
            .map_err(|e| EnvError::storage(format!("Remove failed: {}", e)))?;
        self.db.flush()
            .map_err(|e| EnvError::storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}
