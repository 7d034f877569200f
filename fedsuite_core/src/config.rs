//! Suite defaults - factory values for new tests and timelines.
//!
//! Every field has a default, so a defaults file only needs to name what it
//! overrides:
//!
//! ```json
//! { "n_clients": 20, "dataset": "CIFAR10", "learning_rate": 0.05 }
//! ```

use crate::catalog::{DatasetId, Network};
use crate::loading::LoadingFn;
use crate::model::{DatasetConfig, TestData};
use crate::partition::DistributionFn;
use crate::timeline::NamedTimeline;
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use thiserror::Error;

/// Failure to read a defaults file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid defaults file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Factory values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteDefaults {
    pub n_clients: NonZeroUsize,
    pub rounds: NonZeroU32,

    pub dataset: DatasetId,
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub momentum: f64,
    pub shuffle: bool,
    pub network: Network,

    pub bias: f64,
    pub distribution_base: f64,
    pub distribution_fn: DistributionFn,
    #[serde(alias = "knolwedge_amount")]
    pub knowledge_amount: f64,
    pub loading_fn: LoadingFn,

    /// Timeline every new test starts with
    pub timeline_name: String,
    pub timeline_rounds: u32,

    /// Timeline added to an existing test
    pub new_timeline_name: String,
    pub new_timeline_rounds: u32,
}

impl Default for SuiteDefaults {
    fn default() -> Self {
        Self {
            n_clients: NonZeroUsize::MIN.saturating_add(9),
            rounds: NonZeroU32::MIN.saturating_add(9),
            dataset: DatasetId::Mnist,
            epochs: 1,
            batch_size: 256,
            learning_rate: 0.01,
            momentum: 0.9,
            shuffle: true,
            network: Network::SimpleCnn,
            bias: 0.5,
            distribution_base: 0.5,
            distribution_fn: DistributionFn::Normal,
            knowledge_amount: 0.1,
            loading_fn: LoadingFn::Linear,
            timeline_name: "Default".to_string(),
            timeline_rounds: 10,
            new_timeline_name: "New Pattern".to_string(),
            new_timeline_rounds: 10,
        }
    }
}

impl SuiteDefaults {
    /// Loads defaults from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Dataset settings with even-split indices for `n_clients`.
    pub fn dataset_config(&self) -> DatasetConfig {
        let mut config = DatasetConfig {
            name: self.dataset,
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            momentum: self.momentum,
            shuffle: self.shuffle,
            network: self.network,
            indices: Default::default(),
            bias: self.bias,
            distribution_base: self.distribution_base,
            distribution_fn: self.distribution_fn,
            knowledge_amount: self.knowledge_amount,
            loading_fn: self.loading_fn,
        };
        config.indices = config.default_indices(self.n_clients);
        config
    }

    /// A fresh test named `name`.
    pub fn build_test(&self, name: impl Into<String>) -> TestData {
        TestData {
            name: name.into(),
            n_clients: self.n_clients,
            rounds: self.rounds,
            dataset: self.dataset_config(),
            timelines: vec![NamedTimeline::new(self.timeline_name.clone(), self.timeline_rounds)],
        }
    }

    /// Timeline appended by "add timeline".
    pub fn new_timeline(&self) -> NamedTimeline {
        NamedTimeline::new(self.new_timeline_name.clone(), self.new_timeline_rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("fedsuite_{}_{}.json", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_default_values() {
        let defaults = SuiteDefaults::default();

        assert_eq!(defaults.n_clients.get(), 10);
        assert_eq!(defaults.rounds.get(), 10);
        assert_eq!(defaults.new_timeline().name, "New Pattern");
        assert_eq!(defaults.new_timeline().rounds, 10);
    }

    #[test]
    fn test_partial_file_overrides() {
        let path = write_temp("partial", r#"{ "n_clients": 4, "dataset": "CIFAR10" }"#);
        let defaults = SuiteDefaults::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(defaults.n_clients.get(), 4);
        assert_eq!(defaults.dataset, DatasetId::Cifar10);
        assert_eq!(defaults.batch_size, 256);

        let test = defaults.build_test("T");
        assert_eq!(test.dataset.indices.client_count(), 4);
        assert_eq!(test.dataset.indices.range(0, 0).map(|r| r.len()), Some(1250));
    }

    #[test]
    fn test_invalid_file() {
        let path = write_temp("invalid", r#"{ "n_clients": 0 }"#);
        let result = SuiteDefaults::from_json_file(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
        assert!(matches!(
            SuiteDefaults::from_json_file("/nonexistent/fedsuite.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
