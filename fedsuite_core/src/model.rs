//! Test data model - what a single federated-learning test consists of.

use crate::catalog::{Dataset, DatasetId, Network};
use crate::loading::LoadingFn;
use crate::partition::{
    compute_indices, even_split, DistributionFn, IndexAllocation, PartitionError, PartitionParams,
};
use crate::timeline::NamedTimeline;
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU32, NonZeroUsize};

/// Training and partitioning settings of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Catalog dataset
    pub name: DatasetId,
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub momentum: f64,
    pub shuffle: bool,
    pub network: Network,

    /// Current allocation, client -> class -> range
    pub indices: IndexAllocation,

    pub bias: f64,
    pub distribution_base: f64,
    pub distribution_fn: DistributionFn,
    #[serde(alias = "knolwedge_amount")]
    pub knowledge_amount: f64,
    pub loading_fn: LoadingFn,
}

impl DatasetConfig {
    /// Catalog entry of the selected dataset.
    pub fn dataset(&self) -> &'static Dataset {
        self.name.dataset()
    }

    /// Partition parameters from the current shape fields.
    pub fn partition_params(&self, n_clients: NonZeroUsize) -> PartitionParams {
        PartitionParams::new(n_clients, self.distribution_fn)
            .with_bias(self.bias)
            .with_base(self.distribution_base)
            .with_knowledge(self.knowledge_amount)
    }

    /// Skewed allocation from the current shape fields.
    pub fn skewed_indices(&self, n_clients: NonZeroUsize) -> Result<IndexAllocation, PartitionError> {
        compute_indices(self.dataset(), &self.partition_params(n_clients))
    }

    /// Even-split allocation for the selected dataset.
    pub fn default_indices(&self, n_clients: NonZeroUsize) -> IndexAllocation {
        even_split(self.dataset(), n_clients)
    }
}

/// One test of the suite, keyed by `name` in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    pub name: String,
    pub n_clients: NonZeroUsize,
    pub rounds: NonZeroU32,
    pub dataset: DatasetConfig,
    pub timelines: Vec<NamedTimeline>,
}

impl TestData {
    /// Test built from the factory defaults.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        crate::config::SuiteDefaults::default().build_test(name)
    }

    pub fn timeline(&self, index: usize) -> Option<&NamedTimeline> {
        self.timelines.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let test = TestData::with_defaults("Test 1");

        assert_eq!(test.n_clients.get(), 10);
        assert_eq!(test.rounds.get(), 10);
        assert_eq!(test.dataset.name, DatasetId::Mnist);
        assert_eq!(test.dataset.batch_size, 256);
        assert_eq!(test.dataset.network, Network::SimpleCnn);
        assert_eq!(test.dataset.indices.client_count(), 10);
        assert_eq!(test.timelines.len(), 1);
        assert_eq!(test.timelines[0].name, "Default");
        assert!(test.timelines[0].timeline.is_empty());
    }

    #[test]
    fn test_legacy_knowledge_field() {
        let test = TestData::with_defaults("Test 1");
        let mut value = serde_json::to_value(&test).unwrap();

        let dataset = value["dataset"].as_object_mut().unwrap();
        let knowledge = dataset.remove("knowledge_amount").unwrap();
        dataset.insert("knolwedge_amount".to_string(), knowledge);

        let back: TestData = serde_json::from_value(value).unwrap();
        assert_eq!(back, test);
    }

    #[test]
    fn test_zero_clients_rejected() {
        let test = TestData::with_defaults("Test 1");
        let mut value = serde_json::to_value(&test).unwrap();
        value["n_clients"] = serde_json::json!(0);

        assert!(serde_json::from_value::<TestData>(value).is_err());
    }

    #[test]
    fn test_skewed_indices_use_shape_fields() {
        let mut test = TestData::with_defaults("Test 1");
        test.dataset.knowledge_amount = 0.0;

        let indices = test.dataset.skewed_indices(test.n_clients).unwrap();
        assert_eq!(indices.client_count(), 10);
        assert_eq!(indices.client_total(0), 0);

        test.dataset.bias = 2.0;
        assert_eq!(
            test.dataset.skewed_indices(test.n_clients),
            Err(PartitionError::BiasOutOfRange(2.0))
        );
    }
}
