//! Dataset Catalog - the fixed registry of known labeled datasets.
//!
//! Datasets are identified by a closed [`DatasetId`]; external names are
//! resolved once at the boundary through `FromStr`, which fails with
//! [`CatalogError::UnknownDataset`] instead of yielding nothing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Class identifier within a dataset.
pub type ClassId = u32;

/// Errors raised when resolving an external identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),
}

/// A labeled dataset: a name plus ordered `(class id, class size)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: &'static str,
    pub classes: &'static [(ClassId, usize)],
}

impl Dataset {
    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Total number of items across all classes.
    pub fn total_size(&self) -> usize {
        self.classes.iter().map(|(_, size)| size).sum()
    }

    /// Sizes of each class, in catalog order.
    pub fn class_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.classes.iter().map(|(_, size)| *size)
    }
}

static MNIST: Dataset = Dataset {
    id: DatasetId::Mnist,
    name: "MNIST",
    classes: &[
        (0, 5923),
        (1, 6742),
        (2, 5958),
        (3, 6131),
        (4, 5842),
        (5, 5421),
        (6, 5918),
        (7, 6265),
        (8, 5851),
        (9, 5949),
    ],
};

static CIFAR10: Dataset = Dataset {
    id: DatasetId::Cifar10,
    name: "CIFAR10",
    classes: &[
        (0, 5000),
        (1, 5000),
        (2, 5000),
        (3, 5000),
        (4, 5000),
        (5, 5000),
        (6, 5000),
        (7, 5000),
        (8, 5000),
        (9, 5000),
    ],
};

static FASHION_MNIST: Dataset = Dataset {
    id: DatasetId::FashionMnist,
    name: "FashionMNIST",
    classes: &[
        (0, 6000),
        (1, 6000),
        (2, 6000),
        (3, 6000),
        (4, 6000),
        (5, 6000),
        (6, 6000),
        (7, 6000),
        (8, 6000),
        (9, 6000),
    ],
};

/// Identifiers of the datasets in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DatasetId {
    #[default]
    #[serde(rename = "MNIST")]
    Mnist,

    #[serde(rename = "CIFAR10")]
    Cifar10,

    #[serde(rename = "FashionMNIST")]
    FashionMnist,
}

impl DatasetId {
    /// Returns all catalog entries, first entry is the default.
    pub fn all() -> Vec<DatasetId> {
        vec![DatasetId::Mnist, DatasetId::Cifar10, DatasetId::FashionMnist]
    }

    /// Returns the catalog entry for this identifier.
    pub fn dataset(&self) -> &'static Dataset {
        match self {
            DatasetId::Mnist => &MNIST,
            DatasetId::Cifar10 => &CIFAR10,
            DatasetId::FashionMnist => &FASHION_MNIST,
        }
    }

    /// Returns the external name.
    pub fn name(&self) -> &'static str {
        self.dataset().name
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DatasetId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mnist" => Ok(DatasetId::Mnist),
            "cifar10" | "cifar-10" => Ok(DatasetId::Cifar10),
            "fashionmnist" | "fashion_mnist" | "fashion-mnist" => Ok(DatasetId::FashionMnist),
            _ => Err(CatalogError::UnknownDataset(s.to_string())),
        }
    }
}

/// Model architectures the runner knows how to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Network {
    #[default]
    #[serde(rename = "SimpleCNN")]
    SimpleCnn,

    #[serde(rename = "SimpleNN")]
    SimpleNn,
}

impl Network {
    pub fn all() -> Vec<Network> {
        vec![Network::SimpleCnn, Network::SimpleNn]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::SimpleCnn => "SimpleCNN",
            Network::SimpleNn => "SimpleNN",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Network {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simplecnn" => Ok(Network::SimpleCnn),
            "simplenn" => Ok(Network::SimpleNn),
            _ => Err(CatalogError::UnknownNetwork(s.to_string())),
        }
    }
}
