//! Keyed Reactive Store - the single source of truth for a test suite.
//!
//! Holds name → [`TestData`] in insertion order. Every change goes through a
//! named operation that updates the tree, recomputes dependent values, and
//! then fires the topics declared for it in [`Mutation::topics`]. All
//! callbacks have run by the time the operation returns.
//!
//! Dependent values:
//! - changing `n_clients` or the dataset name resets `indices` to an even split
//! - [`Store::apply_skewed_indices`] replaces `indices` with a skewed allocation

use crate::catalog::{DatasetId, Network};
use crate::config::SuiteDefaults;
use crate::events::{
    DatasetField, EventBus, Mutation, SubscriptionId, TestField, TimelineField, Topic,
};
use crate::export::{SuitePayload, TestPayload};
use crate::loading::LoadingFn;
use crate::model::TestData;
use crate::partition::{
    check_base, check_bias, check_knowledge, DistributionFn, IndexAllocation, PartitionError,
};
use crate::patterns::PatternGenerator;
use crate::summary::AllocationSummary;
use crate::timeline::{EventKind, NamedTimeline, Participant, Round, Timeline};
use fedsuite_env::{BlobStore, EnvError};
use serde_json::{Map, Value};
use std::num::{NonZeroU32, NonZeroUsize};
use thiserror::Error;
use tracing::{debug, info};

/// Blob key the suite is persisted under.
pub const PERSIST_KEY: &str = "tests";

/// Store operation failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown test: {0}")]
    UnknownTest(String),

    #[error("Test already exists: {0}")]
    DuplicateTest(String),

    #[error("Test {test} has no timeline {index} (has {len})")]
    TimelineOutOfRange { test: String, index: usize, len: usize },

    #[error("Invalid partition parameters: {0}")]
    Partition(#[from] PartitionError),

    #[error("Malformed suite data: {0}")]
    Parse(String),

    #[error("Failed to encode suite: {0}")]
    Serialization(String),

    #[error(transparent)]
    Env(#[from] EnvError),
}

// =============================================================================
// UPDATES
// =============================================================================

/// New value for a top-level test field. Renaming is [`Store::rename_test`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestUpdate {
    NClients(NonZeroUsize),
    Rounds(NonZeroU32),
}

impl TestUpdate {
    pub fn field(&self) -> TestField {
        match self {
            TestUpdate::NClients(_) => TestField::NClients,
            TestUpdate::Rounds(_) => TestField::Rounds,
        }
    }
}

/// New value for a dataset field.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetUpdate {
    Name(DatasetId),
    Epochs(u32),
    BatchSize(u32),
    LearningRate(f64),
    Momentum(f64),
    Shuffle(bool),
    Network(Network),
    Indices(IndexAllocation),
    Bias(f64),
    DistributionBase(f64),
    DistributionFn(DistributionFn),
    KnowledgeAmount(f64),
    LoadingFn(LoadingFn),
}

impl DatasetUpdate {
    pub fn field(&self) -> DatasetField {
        match self {
            DatasetUpdate::Name(_) => DatasetField::Name,
            DatasetUpdate::Epochs(_) => DatasetField::Epochs,
            DatasetUpdate::BatchSize(_) => DatasetField::BatchSize,
            DatasetUpdate::LearningRate(_) => DatasetField::LearningRate,
            DatasetUpdate::Momentum(_) => DatasetField::Momentum,
            DatasetUpdate::Shuffle(_) => DatasetField::Shuffle,
            DatasetUpdate::Network(_) => DatasetField::Network,
            DatasetUpdate::Indices(_) => DatasetField::Indices,
            DatasetUpdate::Bias(_) => DatasetField::Bias,
            DatasetUpdate::DistributionBase(_) => DatasetField::DistributionBase,
            DatasetUpdate::DistributionFn(_) => DatasetField::DistributionFn,
            DatasetUpdate::KnowledgeAmount(_) => DatasetField::KnowledgeAmount,
            DatasetUpdate::LoadingFn(_) => DatasetField::LoadingFn,
        }
    }
}

/// New value for a named timeline field.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineUpdate {
    Name(String),
    Timeline(Timeline),
    Rounds(u32),
}

impl TimelineUpdate {
    pub fn field(&self) -> TimelineField {
        match self {
            TimelineUpdate::Name(_) => TimelineField::Name,
            TimelineUpdate::Timeline(_) => TimelineField::Timeline,
            TimelineUpdate::Rounds(_) => TimelineField::Rounds,
        }
    }
}

/// In-place edit of a timeline's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEdit {
    /// Set or clear one cell
    SetEvent {
        round: Round,
        participant: Participant,
        kind: Option<EventKind>,
    },
    /// Paste `from`'s row onto `to` over the active rounds
    CopyRow { from: Participant, to: Participant },
    /// Clear a row over the active rounds
    ClearRow { participant: Participant },
}

// =============================================================================
// STORE
// =============================================================================

/// The test suite plus its subscribers.
#[derive(Debug, Default)]
pub struct Store {
    tests: Vec<TestData>,
    defaults: SuiteDefaults,
    bus: EventBus,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose factory operations use `defaults`.
    pub fn with_defaults(defaults: SuiteDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &SuiteDefaults {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Test names in insertion order.
    pub fn test_names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestData> {
        self.tests.iter()
    }

    pub fn get_test(&self, name: &str) -> Option<&TestData> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_test(name).is_some()
    }

    fn position(&self, name: &str) -> Result<usize, StoreError> {
        self.tests
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| StoreError::UnknownTest(name.to_string()))
    }

    fn test_mut(&mut self, name: &str) -> Result<&mut TestData, StoreError> {
        let index = self.position(name)?;
        Ok(&mut self.tests[index])
    }

    fn timeline_mut(&mut self, name: &str, index: usize) -> Result<&mut NamedTimeline, StoreError> {
        let test = self.test_mut(name)?;
        let len = test.timelines.len();
        test.timelines
            .get_mut(index)
            .ok_or_else(|| StoreError::TimelineOutOfRange {
                test: name.to_string(),
                index,
                len,
            })
    }

    fn publish(&mut self, mutation: Mutation) {
        self.bus.publish(&mutation);
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    pub fn subscribe<F>(&mut self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: FnMut(&Topic) + Send + 'static,
    {
        self.bus.subscribe(topic, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // -------------------------------------------------------------------------
    // Test set
    // -------------------------------------------------------------------------

    /// Inserts `test`. A test with the same name is replaced in place.
    pub fn add_test(&mut self, test: TestData) {
        match self.tests.iter_mut().find(|t| t.name == test.name) {
            Some(existing) => *existing = test,
            None => self.tests.push(test),
        }
        self.publish(Mutation::TestSet);
    }

    /// Adds a factory test named `Test <k>` and returns its name.
    pub fn add_default_test(&mut self) -> String {
        let name = (self.tests.len() + 1..)
            .map(|k| format!("Test {}", k))
            .find(|name| !self.contains(name))
            .unwrap_or_default();

        let test = self.defaults.build_test(name.clone());
        self.add_test(test);
        name
    }

    pub fn remove_test(&mut self, name: &str) -> Result<TestData, StoreError> {
        let index = self.position(name)?;
        let removed = self.tests.remove(index);
        self.publish(Mutation::TestSet);
        Ok(removed)
    }

    /// Deep-copies `name` under `"<name> (copy)"`, adding further suffixes
    /// until the name is free. Returns the new name.
    pub fn clone_test(&mut self, name: &str) -> Result<String, StoreError> {
        let mut copy = self.tests[self.position(name)?].clone();

        let mut new_name = format!("{} (copy)", name);
        while self.contains(&new_name) {
            new_name.push_str(" (copy)");
        }

        copy.name = new_name.clone();
        self.add_test(copy);
        Ok(new_name)
    }

    /// Re-keys a test, keeping its position.
    pub fn rename_test(&mut self, old: &str, new: &str) -> Result<(), StoreError> {
        let index = self.position(old)?;
        if old == new {
            return Ok(());
        }
        if self.contains(new) {
            return Err(StoreError::DuplicateTest(new.to_string()));
        }

        self.tests[index].name = new.to_string();
        self.publish(Mutation::Renamed { old: old.to_string() });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Fields
    // -------------------------------------------------------------------------

    pub fn set_test_field(&mut self, name: &str, update: TestUpdate) -> Result<(), StoreError> {
        let field = update.field();
        let test = self.test_mut(name)?;

        match update {
            TestUpdate::NClients(n) => {
                test.n_clients = n;
                test.dataset.indices = test.dataset.default_indices(n);
            }
            TestUpdate::Rounds(rounds) => test.rounds = rounds,
        }

        self.publish(Mutation::TestField {
            test: name.to_string(),
            field,
        });
        Ok(())
    }

    pub fn set_dataset_field(&mut self, name: &str, update: DatasetUpdate) -> Result<(), StoreError> {
        let field = update.field();
        let test = self.test_mut(name)?;
        let dataset = &mut test.dataset;

        match update {
            DatasetUpdate::Name(id) => {
                dataset.name = id;
                dataset.indices = dataset.default_indices(test.n_clients);
            }
            DatasetUpdate::Epochs(v) => dataset.epochs = v,
            DatasetUpdate::BatchSize(v) => dataset.batch_size = v,
            DatasetUpdate::LearningRate(v) => dataset.learning_rate = v,
            DatasetUpdate::Momentum(v) => dataset.momentum = v,
            DatasetUpdate::Shuffle(v) => dataset.shuffle = v,
            DatasetUpdate::Network(v) => dataset.network = v,
            DatasetUpdate::Indices(v) => dataset.indices = v,
            DatasetUpdate::Bias(v) => dataset.bias = check_bias(v)?,
            DatasetUpdate::DistributionBase(v) => dataset.distribution_base = check_base(v)?,
            DatasetUpdate::DistributionFn(v) => dataset.distribution_fn = v,
            DatasetUpdate::KnowledgeAmount(v) => dataset.knowledge_amount = check_knowledge(v)?,
            DatasetUpdate::LoadingFn(v) => dataset.loading_fn = v,
        }

        self.publish(Mutation::DatasetField {
            test: name.to_string(),
            field,
        });
        Ok(())
    }

    /// Replaces `indices` with a skewed allocation from the current shape
    /// fields. On error the test is left unchanged.
    pub fn apply_skewed_indices(&mut self, name: &str) -> Result<(), StoreError> {
        let test = self.test_mut(name)?;
        let indices = test.dataset.skewed_indices(test.n_clients)?;

        debug!(test = name, clients = indices.client_count(), "applied skewed indices");
        self.set_dataset_field(name, DatasetUpdate::Indices(indices))
    }

    /// Sets the knowledge amount back to `1 / n_clients`.
    pub fn reset_knowledge_amount(&mut self, name: &str) -> Result<(), StoreError> {
        let n_clients = self.test_mut(name)?.n_clients.get();
        self.set_dataset_field(name, DatasetUpdate::KnowledgeAmount(1.0 / n_clients as f64))
    }

    /// Allocation summary of the current indices.
    pub fn allocation_summary(&self, name: &str) -> Result<AllocationSummary, StoreError> {
        let test = &self.tests[self.position(name)?];
        Ok(AllocationSummary::from_allocation(
            test.dataset.dataset(),
            &test.dataset.indices,
        ))
    }

    // -------------------------------------------------------------------------
    // Timelines
    // -------------------------------------------------------------------------

    pub fn timelines(&self, name: &str) -> Result<&[NamedTimeline], StoreError> {
        Ok(&self.tests[self.position(name)?].timelines)
    }

    pub fn get_timeline(&self, name: &str, index: usize) -> Result<&NamedTimeline, StoreError> {
        let timelines = self.timelines(name)?;
        timelines
            .get(index)
            .ok_or_else(|| StoreError::TimelineOutOfRange {
                test: name.to_string(),
                index,
                len: timelines.len(),
            })
    }

    /// Appends a default timeline and returns its index.
    pub fn add_timeline(&mut self, name: &str) -> Result<usize, StoreError> {
        let timeline = self.defaults.new_timeline();
        let test = self.test_mut(name)?;
        test.timelines.push(timeline);
        let index = test.timelines.len() - 1;

        self.publish(Mutation::TimelineSet { test: name.to_string() });
        Ok(index)
    }

    pub fn remove_timeline(&mut self, name: &str, index: usize) -> Result<NamedTimeline, StoreError> {
        self.timeline_mut(name, index)?;
        let removed = self.test_mut(name)?.timelines.remove(index);

        self.publish(Mutation::TimelineSet { test: name.to_string() });
        Ok(removed)
    }

    pub fn set_timeline_field(
        &mut self,
        name: &str,
        index: usize,
        update: TimelineUpdate,
    ) -> Result<(), StoreError> {
        let field = update.field();
        let named = self.timeline_mut(name, index)?;

        match update {
            TimelineUpdate::Name(v) => named.name = v,
            TimelineUpdate::Timeline(v) => named.timeline = v,
            TimelineUpdate::Rounds(v) => named.rounds = v,
        }

        self.publish(Mutation::TimelineField {
            test: name.to_string(),
            index,
            field,
        });
        Ok(())
    }

    /// Replaces a timeline's events and rounds with a generated schedule for
    /// the test's client count. The timeline keeps its name.
    pub fn apply_pattern(
        &mut self,
        name: &str,
        index: usize,
        generator: &dyn PatternGenerator,
    ) -> Result<(), StoreError> {
        let clients = self.test_mut(name)?.n_clients.get();
        let schedule = generator.generate(clients);
        let named = self.timeline_mut(name, index)?;
        named.timeline = schedule.timeline;
        named.rounds = schedule.rounds;

        self.publish(Mutation::PatternApplied {
            test: name.to_string(),
            index,
        });
        Ok(())
    }

    /// Edits a timeline's events in place.
    pub fn edit_timeline(&mut self, name: &str, index: usize, edit: TimelineEdit) -> Result<(), StoreError> {
        let named = self.timeline_mut(name, index)?;
        let rounds = named.rounds;

        match edit {
            TimelineEdit::SetEvent {
                round,
                participant,
                kind,
            } => named.timeline.set_event(round, participant, kind),
            TimelineEdit::CopyRow { from, to } => named.timeline.copy_client(from, to, rounds),
            TimelineEdit::ClearRow { participant } => named.timeline.clear_client(participant, rounds),
        }

        self.publish(Mutation::TimelineField {
            test: name.to_string(),
            index,
            field: TimelineField::Timeline,
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Export & persistence
    // -------------------------------------------------------------------------

    pub fn export_test(&self, name: &str) -> Result<TestPayload, StoreError> {
        Ok(TestPayload::from(&self.tests[self.position(name)?]))
    }

    /// Payload whose top-level `timeline` is timeline `index` of the test.
    pub fn export_test_timeline(&self, name: &str, index: usize) -> Result<TestPayload, StoreError> {
        let test = &self.tests[self.position(name)?];
        TestPayload::for_timeline(test, index).ok_or_else(|| StoreError::TimelineOutOfRange {
            test: name.to_string(),
            index,
            len: test.timelines.len(),
        })
    }

    pub fn export_suite(&self) -> SuitePayload {
        self.tests.iter().map(TestPayload::from).collect()
    }

    /// Persistence form: `{ "<name>": TestData, ... }` in insertion order.
    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        let mut map = Map::new();
        for test in &self.tests {
            let value = serde_json::to_value(test)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            map.insert(test.name.clone(), value);
        }
        serde_json::to_vec(&map).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Parses the persistence form. The object key is authoritative for the
    /// test name.
    pub fn parse_json(bytes: &[u8]) -> Result<Vec<TestData>, StoreError> {
        let map: Map<String, Value> =
            serde_json::from_slice(bytes).map_err(|e| StoreError::Parse(e.to_string()))?;

        map.into_iter()
            .map(|(name, value)| {
                let mut test: TestData = serde_json::from_value(value)
                    .map_err(|e| StoreError::Parse(format!("{}: {}", name, e)))?;
                test.name = name;
                Ok(test)
            })
            .collect()
    }

    /// Writes the whole suite under [`PERSIST_KEY`].
    pub fn persist(&self, blobs: &dyn BlobStore) -> Result<(), StoreError> {
        let bytes = self.to_json()?;
        blobs.put(PERSIST_KEY, &bytes)?;

        info!(tests = self.tests.len(), bytes = bytes.len(), "persisted suite");
        Ok(())
    }

    /// Replaces the whole suite with the persisted one.
    ///
    /// Returns `Ok(false)` and changes nothing when no suite was persisted.
    /// Malformed data is an error and also changes nothing.
    pub fn load(&mut self, blobs: &dyn BlobStore) -> Result<bool, StoreError> {
        let Some(bytes) = blobs.get(PERSIST_KEY)? else {
            debug!("no persisted suite");
            return Ok(false);
        };

        self.tests = Self::parse_json(&bytes)?;
        info!(tests = self.tests.len(), "loaded suite");

        self.publish(Mutation::TestSet);
        Ok(true)
    }
}
