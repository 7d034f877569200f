//! JSON exporter for the simulation runner.
//!
//! Writes the whole suite as an array of test payloads, and builds the
//! machine-readable summary printed with `--json`.

use crate::error::CliError;
use fedsuite_core::{Store, SuitePayload};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Pretty-printed suite payload.
pub fn suite_json(store: &Store) -> Result<String, CliError> {
    let payload: SuitePayload = store.export_suite();
    Ok(serde_json::to_string_pretty(&payload)?)
}

/// Writes the suite payload to `path`. Returns the number of tests written.
pub fn write_suite(store: &Store, path: impl AsRef<Path>) -> Result<usize, CliError> {
    let path = path.as_ref();
    let json = suite_json(store)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;

    info!(tests = store.len(), path = %path.display(), "exported suite");
    Ok(store.len())
}

/// One line of the suite summary.
#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub name: String,
    pub dataset: String,
    pub n_clients: usize,
    pub rounds: u32,
    pub timelines: usize,
    /// Events over all timelines
    pub events: usize,
    pub assigned: usize,
    pub unassigned: usize,
}

/// Summary of every test, in store order.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub tests: Vec<TestSummary>,
}

impl SuiteSummary {
    pub fn from_store(store: &Store) -> Result<Self, CliError> {
        let tests = store
            .tests()
            .map(|test| {
                let allocation = store.allocation_summary(&test.name)?;
                let events = test
                    .timelines
                    .iter()
                    .map(|named| {
                        named
                            .timeline
                            .rounds()
                            .map(|round| named.timeline.events(round).len())
                            .sum::<usize>()
                    })
                    .sum();

                Ok(TestSummary {
                    name: test.name.clone(),
                    dataset: test.dataset.name.to_string(),
                    n_clients: test.n_clients.get(),
                    rounds: test.rounds.get(),
                    timelines: test.timelines.len(),
                    events,
                    assigned: allocation.dataset_size - allocation.unassigned,
                    unassigned: allocation.unassigned,
                })
            })
            .collect::<Result<Vec<_>, CliError>>()?;

        Ok(Self {
            total: tests.len(),
            tests,
        })
    }
}
