//! Export payload - the JSON shape consumed by the simulation runner.
//!
//! ```text
//! { name, n_clients, rounds, dataset,
//!   timeline: [ [ [type, client], ... ], ... ],
//!   timelines: [ { name, rounds, timeline }, ... ] }
//! ```
//!
//! The runner executes the top-level `timeline`, which is the selected
//! timeline of the test (the first one unless another is requested).
//! Timelines are emitted in canonical order (see [`Timeline::canonical_rounds`]).

use crate::model::{DatasetConfig, TestData};
use crate::timeline::{ExportedEvent, NamedTimeline, Timeline};
use serde::Serialize;

/// One timeline as exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePayload {
    pub name: String,
    pub rounds: u32,
    pub timeline: Vec<Vec<ExportedEvent>>,
}

impl From<&NamedTimeline> for TimelinePayload {
    fn from(named: &NamedTimeline) -> Self {
        Self {
            name: named.name.clone(),
            rounds: named.rounds,
            timeline: named.timeline.canonical_rounds(),
        }
    }
}

/// One test as exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestPayload {
    pub name: String,
    pub n_clients: usize,
    pub rounds: u32,
    pub dataset: DatasetConfig,
    /// Rounds executed by the runner, one inner array per present round
    pub timeline: Vec<Vec<ExportedEvent>>,
    pub timelines: Vec<TimelinePayload>,
}

impl From<&TestData> for TestPayload {
    /// Runs the first timeline; a test without timelines runs an empty one.
    fn from(test: &TestData) -> Self {
        Self::for_timeline(test, 0).unwrap_or_else(|| Self::build(test, Vec::new()))
    }
}

impl TestPayload {
    /// Payload running timeline `index`, or `None` if there is no such timeline.
    pub fn for_timeline(test: &TestData, index: usize) -> Option<Self> {
        let selected = test.timelines.get(index)?;
        Some(Self::build(test, selected.timeline.canonical_rounds()))
    }

    fn build(test: &TestData, timeline: Vec<Vec<ExportedEvent>>) -> Self {
        Self {
            name: test.name.clone(),
            n_clients: test.n_clients.get(),
            rounds: test.rounds.get(),
            dataset: test.dataset.clone(),
            timeline,
            timelines: test.timelines.iter().map(TimelinePayload::from).collect(),
        }
    }

    /// Request body for the runner.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// All tests of a suite, in store order.
pub type SuitePayload = Vec<TestPayload>;

/// Canonical form of a bare timeline.
pub fn export_timeline(timeline: &Timeline) -> Vec<Vec<ExportedEvent>> {
    timeline.canonical_rounds()
}
