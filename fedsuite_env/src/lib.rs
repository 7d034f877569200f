//! fedsuite Environment Abstraction Layer
//!
//! This crate isolates everything the authoring core must not do itself:
//! - **Persistence**: an opaque key/value blob store (`BlobStore`)
//! - **Execution**: the boundary to the external simulation runner
//!   (`SimulationRunner`)
//!
//! The core only ever replaces whole snapshots, so the storage contract is a
//! plain `put`/`get` of bytes.
//!
//! # Example
//!
//! ```ignore
//! use fedsuite_env::{BlobStore, SledBlobStore};
//!
//! let blobs = SledBlobStore::open("suite.db")?;
//! store.persist(&blobs)?;
//! ```

mod blob;
mod error;
mod local_runner;
mod runner;
mod sled_impl;
mod types;

pub use blob::{BlobStore, MemoryBlobStore};
pub use error::EnvError;
pub use local_runner::LocalRunner;
pub use runner::SimulationRunner;
pub use sled_impl::SledBlobStore;
pub use types::{RunRequest, RunStatus, StatusQuery};
