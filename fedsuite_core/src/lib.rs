//! fedsuite core - authoring model for federated-learning test suites.
//!
//! A suite is a set of *tests*. Each test describes:
//! 1. **Data**: how a labeled dataset is partitioned across simulated clients
//!    (even split, or label-skewed via [`partition::compute_indices`])
//! 2. **Schedule**: round-by-round COMM / RETR / AGG events per client
//!    ([`timeline::Timeline`]), hand-edited or synthesized by
//!    [`patterns::PatternKind`]
//!
//! The [`store::Store`] owns the suite, keeps dependent values consistent and
//! notifies subscribers of every change. [`export`] produces the payload the
//! simulation runner consumes.

pub mod catalog;
pub mod config;
pub mod events;
pub mod export;
pub mod loading;
pub mod model;
pub mod partition;
pub mod patterns;
pub mod store;
pub mod summary;
pub mod timeline;

// Re-export key types for convenience
pub use catalog::{CatalogError, Dataset, DatasetId, Network};
pub use config::{ConfigError, SuiteDefaults};
pub use events::{DatasetField, EventBus, Mutation, SubscriptionId, TestField, TimelineField, Topic};
pub use export::{SuitePayload, TestPayload, TimelinePayload};
pub use loading::{loading_series, LoadingFn};
pub use model::{DatasetConfig, TestData};
pub use partition::{
    client_class_distribution, compute_indices, even_split, normalize_distribution, ClassRange,
    ClientId, DistributionFn, IndexAllocation, PartitionError, PartitionParams,
};
pub use patterns::{EvenLatency, GeneratedSchedule, PatternError, PatternGenerator, PatternKind};
pub use store::{DatasetUpdate, Store, StoreError, TestUpdate, TimelineEdit, TimelineUpdate};
pub use summary::{AllocationSummary, ClientSummary};
pub use timeline::{EventKind, NamedTimeline, Participant, RoundEvent, Timeline};
