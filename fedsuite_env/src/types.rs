//! Common types for the simulation runner boundary.

use serde::{Deserialize, Serialize};

/// Lifecycle of a submitted test as seen by the authoring side.
///
/// `Idle` never comes from the runner: it is the local state before
/// submission and the fallback after any transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Queued,
    Running,
    Finished,
}

impl RunStatus {
    /// Returns true while the runner still owns the test.
    pub fn is_pending(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::Running)
    }

    /// Returns the wire name of the status.
    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Envelope for a test submitted to the runner.
///
/// The body is the JSON export payload, opaque at this layer. `name`
/// correlates later status queries with the submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Test name (correlation key)
    pub name: String,

    /// Serialized export payload
    pub body: Vec<u8>,
}

impl RunRequest {
    /// Creates a new request from a payload body.
    pub fn new(name: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Returns the body size in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Status query: `{ "name": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusQuery {
    pub name: String,
}

impl StatusQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
