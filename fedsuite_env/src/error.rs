//! Error types for the fedsuite environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Blob store read/write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The simulation runner rejected or failed a request
    #[error("Runner error: {0}")]
    Runner(String),

    /// Payload serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a runner error.
    pub fn runner(msg: impl Into<String>) -> Self {
        Self::Runner(msg.into())
    }
}
