//! Allocation summary - per-client class shares and the unassigned pool.
//!
//! This is the data behind allocation charts: which fraction of every class
//! each client holds, how many items each client holds in total, and how many
//! items nobody holds.

use crate::catalog::Dataset;
use crate::partition::{ClientId, IndexAllocation};
use serde::{Deserialize, Serialize};

/// Share of one class held by one client, rounded to three decimals.
fn rounded_share(len: usize, size: usize) -> f64 {
    if size == 0 {
        return 0.0;
    }
    (len as f64 / size as f64 * 1000.0).round() / 1000.0
}

/// Summary of a single client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub client: ClientId,
    /// Fraction of each class, in catalog order
    pub class_shares: Vec<f64>,
    /// Items held across all classes
    pub total: usize,
}

/// Summary of a whole allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub clients: Vec<ClientSummary>,
    /// Items of the dataset assigned to no client
    pub unassigned: usize,
    /// Total dataset size
    pub dataset_size: usize,
}

impl AllocationSummary {
    /// Builds the summary of `allocation` over `dataset`.
    pub fn from_allocation(dataset: &Dataset, allocation: &IndexAllocation) -> Self {
        let clients: Vec<ClientSummary> = allocation
            .clients()
            .map(|client| {
                let class_shares = dataset
                    .classes
                    .iter()
                    .map(|&(class_id, size)| {
                        let len = allocation.range(client, class_id).map(|r| r.len()).unwrap_or(0);
                        rounded_share(len, size)
                    })
                    .collect();

                ClientSummary {
                    client,
                    class_shares,
                    total: allocation.client_total(client),
                }
            })
            .collect();

        let dataset_size = dataset.total_size();
        let assigned: usize = clients.iter().map(|c| c.total).sum();

        Self {
            clients,
            unassigned: dataset_size.saturating_sub(assigned),
            dataset_size,
        }
    }

    /// Fraction of the dataset assigned to some client.
    pub fn coverage(&self) -> f64 {
        if self.dataset_size == 0 {
            0.0
        } else {
            (self.dataset_size - self.unassigned) as f64 / self.dataset_size as f64
        }
    }
}
