//! Change notifications for the test store.
//!
//! Topics form a hierarchy rendered as dotted strings:
//!
//! ```text
//! *
//! tests
//! test.<name>
//! ├── test.<name>.<field>
//! ├── test.<name>.dataset
//! │   └── test.<name>.dataset.<field>
//! └── test.<name>.timelines
//!     └── test.<name>.timelines.<i>
//!         └── test.<name>.timelines.<i>.<field>
//! ```
//!
//! Which topics a mutation fires is declared once, in [`Mutation::topics`].
//! Firing a topic does not fire its parents; the table lists them explicitly.

use std::collections::HashMap;
use tracing::debug;

// =============================================================================
// FIELDS
// =============================================================================

/// Top-level fields of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestField {
    Name,
    NClients,
    Rounds,
}

impl TestField {
    pub fn key(&self) -> &'static str {
        match self {
            TestField::Name => "name",
            TestField::NClients => "n_clients",
            TestField::Rounds => "rounds",
        }
    }
}

/// Fields of a test's dataset settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetField {
    Name,
    Epochs,
    BatchSize,
    LearningRate,
    Momentum,
    Shuffle,
    Network,
    Indices,
    Bias,
    DistributionBase,
    DistributionFn,
    KnowledgeAmount,
    LoadingFn,
}

impl DatasetField {
    pub fn key(&self) -> &'static str {
        match self {
            DatasetField::Name => "name",
            DatasetField::Epochs => "epochs",
            DatasetField::BatchSize => "batch_size",
            DatasetField::LearningRate => "learning_rate",
            DatasetField::Momentum => "momentum",
            DatasetField::Shuffle => "shuffle",
            DatasetField::Network => "network",
            DatasetField::Indices => "indices",
            DatasetField::Bias => "bias",
            DatasetField::DistributionBase => "distribution_base",
            DatasetField::DistributionFn => "distribution_fn",
            DatasetField::KnowledgeAmount => "knowledge_amount",
            DatasetField::LoadingFn => "loading_fn",
        }
    }
}

/// Fields of a named timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelineField {
    Name,
    Timeline,
    Rounds,
}

impl TimelineField {
    pub fn key(&self) -> &'static str {
        match self {
            TimelineField::Name => "name",
            TimelineField::Timeline => "timeline",
            TimelineField::Rounds => "rounds",
        }
    }
}

// =============================================================================
// TOPICS
// =============================================================================

/// A notification topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Wildcard, fired after every other topic
    All,
    /// The set of test names
    Tests,
    Test(String),
    TestField(String, TestField),
    Dataset(String),
    DatasetField(String, DatasetField),
    Timelines(String),
    Timeline(String, usize),
    TimelineField(String, usize, TimelineField),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::All => write!(f, "*"),
            Topic::Tests => write!(f, "tests"),
            Topic::Test(test) => write!(f, "test.{}", test),
            Topic::TestField(test, field) => write!(f, "test.{}.{}", test, field.key()),
            Topic::Dataset(test) => write!(f, "test.{}.dataset", test),
            Topic::DatasetField(test, field) => write!(f, "test.{}.dataset.{}", test, field.key()),
            Topic::Timelines(test) => write!(f, "test.{}.timelines", test),
            Topic::Timeline(test, i) => write!(f, "test.{}.timelines.{}", test, i),
            Topic::TimelineField(test, i, field) => {
                write!(f, "test.{}.timelines.{}.{}", test, i, field.key())
            }
        }
    }
}

// =============================================================================
// CASCADE TABLE
// =============================================================================

/// A store mutation, as far as notifications are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Tests added, removed, cloned or reloaded
    TestSet,
    /// A test was re-keyed
    Renamed { old: String },
    TestField { test: String, field: TestField },
    DatasetField { test: String, field: DatasetField },
    /// Timelines added or removed
    TimelineSet { test: String },
    TimelineField { test: String, index: usize, field: TimelineField },
    /// A generator replaced a timeline's events and rounds
    PatternApplied { test: String, index: usize },
}

impl Mutation {
    /// Topics to fire, in order, without duplicates.
    pub fn topics(&self) -> Vec<Topic> {
        let raw = match self {
            Mutation::TestSet => vec![Topic::Tests],
            Mutation::Renamed { old } => vec![
                Topic::Tests,
                Topic::Test(old.clone()),
                Topic::TestField(old.clone(), TestField::Name),
            ],
            Mutation::TestField { test, field } => {
                let mut topics = Vec::new();
                if *field == TestField::NClients {
                    topics.extend(Self::dataset_topics(test, DatasetField::Indices));
                }
                topics.push(Topic::Test(test.clone()));
                topics.push(Topic::TestField(test.clone(), *field));
                topics
            }
            Mutation::DatasetField { test, field } => {
                let mut topics = Vec::new();
                if *field == DatasetField::Name {
                    topics.extend(Self::dataset_topics(test, DatasetField::Indices));
                }
                topics.extend(Self::dataset_topics(test, *field));
                topics
            }
            Mutation::TimelineSet { test } => {
                vec![Topic::Test(test.clone()), Topic::Timelines(test.clone())]
            }
            Mutation::TimelineField { test, index, field } => vec![
                Topic::Timeline(test.clone(), *index),
                Topic::TimelineField(test.clone(), *index, *field),
            ],
            Mutation::PatternApplied { test, index } => vec![
                Topic::Timeline(test.clone(), *index),
                Topic::TimelineField(test.clone(), *index, TimelineField::Timeline),
                Topic::TimelineField(test.clone(), *index, TimelineField::Rounds),
            ],
        };

        let mut topics: Vec<Topic> = Vec::with_capacity(raw.len());
        for topic in raw {
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    fn dataset_topics(test: &str, field: DatasetField) -> [Topic; 3] {
        [
            Topic::Test(test.to_string()),
            Topic::Dataset(test.to_string()),
            Topic::DatasetField(test.to_string(), field),
        ]
    }
}

// =============================================================================
// BUS
// =============================================================================

/// Subscriber callback. Receives the topic that fired.
pub type Callback = Box<dyn FnMut(&Topic) + Send>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Topic → subscribers registry.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: HashMap<Topic, Vec<(SubscriptionId, Callback)>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.subscribers.len())
            .field("subscribers", &self.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` on `topic`.
    pub fn subscribe<F>(&mut self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: FnMut(&Topic) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers
            .entry(topic)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.subscribers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|(sub_id, _)| *sub_id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Total number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Invokes `topic`'s subscribers, then the wildcard subscribers.
    pub fn notify(&mut self, topic: &Topic) {
        debug!(topic = %topic, "notify");

        if let Some(subs) = self.subscribers.get_mut(topic) {
            for (_, callback) in subs.iter_mut() {
                callback(topic);
            }
        }

        if *topic != Topic::All {
            if let Some(subs) = self.subscribers.get_mut(&Topic::All) {
                for (_, callback) in subs.iter_mut() {
                    callback(topic);
                }
            }
        }
    }

    /// Fires every topic of `mutation`.
    pub fn publish(&mut self, mutation: &Mutation) {
        for topic in mutation.topics() {
            self.notify(&topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn rendered(mutation: Mutation) -> Vec<String> {
        mutation.topics().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_topic_rendering() {
        assert_eq!(Topic::All.to_string(), "*");
        assert_eq!(Topic::TestField("a".into(), TestField::NClients).to_string(), "test.a.n_clients");
        assert_eq!(
            Topic::DatasetField("a".into(), DatasetField::KnowledgeAmount).to_string(),
            "test.a.dataset.knowledge_amount"
        );
        assert_eq!(
            Topic::TimelineField("a".into(), 2, TimelineField::Rounds).to_string(),
            "test.a.timelines.2.rounds"
        );
    }

    #[test]
    fn test_n_clients_cascade() {
        let topics = rendered(Mutation::TestField {
            test: "t".into(),
            field: TestField::NClients,
        });

        assert_eq!(
            topics,
            vec!["test.t", "test.t.dataset", "test.t.dataset.indices", "test.t.n_clients"]
        );
    }

    #[test]
    fn test_dataset_name_cascade() {
        let topics = rendered(Mutation::DatasetField {
            test: "t".into(),
            field: DatasetField::Name,
        });

        assert_eq!(
            topics,
            vec!["test.t", "test.t.dataset", "test.t.dataset.indices", "test.t.dataset.name"]
        );
    }

    #[test]
    fn test_pattern_cascade() {
        let topics = rendered(Mutation::PatternApplied {
            test: "t".into(),
            index: 0,
        });

        assert_eq!(
            topics,
            vec!["test.t.timelines.0", "test.t.timelines.0.timeline", "test.t.timelines.0.rounds"]
        );
    }

    #[test]
    fn test_wildcard_runs_after_each_topic() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let l = log.clone();
        bus.subscribe(Topic::Tests, move |t| l.lock().unwrap().push(format!("tests:{}", t)));
        let l = log.clone();
        bus.subscribe(Topic::All, move |t| l.lock().unwrap().push(format!("*:{}", t)));

        bus.publish(&Mutation::TimelineSet { test: "t".into() });
        bus.publish(&Mutation::TestSet);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["*:test.t", "*:test.t.timelines", "tests:tests", "*:tests"]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();

        let c = count.clone();
        let id = bus.subscribe(Topic::Tests, move |_| *c.lock().unwrap() += 1);
        bus.notify(&Topic::Tests);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.is_empty());

        bus.notify(&Topic::Tests);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
