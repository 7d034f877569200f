//! Simulation runner abstraction.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{RunRequest, RunStatus, StatusQuery};

/// Boundary to the external simulation runner.
///
/// # Implementations
///
/// - **Remote**: an HTTP client posting to the runner service (not part of
///   this workspace)
/// - **Local**: [`LocalRunner`](crate::LocalRunner), an in-process stand-in
///
/// # Request Flow
///
/// ```text
/// Author                      Runner
///   |-- submit(request) -------->|  queued
///   |-- status({name}) --------->|
///   |<------------- running -----|
///   |-- status({name}) --------->|
///   |<------------ finished -----|
/// ```
#[async_trait]
pub trait SimulationRunner: Send + Sync + 'static {
    /// Submits a test for execution.
    ///
    /// # Returns
    /// * `Ok(())` - The runner accepted the test
    /// * `Err(EnvError::Runner)` - The runner rejected it or was unreachable
    async fn submit(&self, request: RunRequest) -> Result<(), EnvError>;

    /// Queries the status of a previously submitted test by name.
    async fn status(&self, query: &StatusQuery) -> Result<RunStatus, EnvError>;
}
