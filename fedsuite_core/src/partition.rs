//! Distribution Partitioner - label-skewed (non-IID) index allocation.
//!
//! Turns a skew description into per-client, per-class index ranges over
//! a catalog dataset:
//! 1. **Shape**: a named weight curve over class indices ([`DistributionFn`])
//! 2. **Rotation**: each client sees the curve shifted by its id, so every
//!    client emphasizes different classes
//! 3. **Clipping**: classes whose requested items exceed their pool are
//!    scaled back to exactly fill it
//! 4. **Layout**: floored sizes are laid out as contiguous, disjoint ranges
//!
//! Whatever is not handed out stays unassigned.

use crate::catalog::{CatalogError, ClassId, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::debug;

/// Client identifier, `0..n_clients`.
pub type ClientId = u32;

/// Bias of exactly 1 would divide by zero in the linear curve.
const LINEAR_MAX_BIAS: f64 = 0.9999;

/// Invalid shape parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    #[error("Bias must be within [0, 1], got {0}")]
    BiasOutOfRange(f64),

    #[error("Distribution base must be within [0, 1], got {0}")]
    BaseOutOfRange(f64),

    #[error("Knowledge amount must be within [0, 1], got {0}")]
    KnowledgeOutOfRange(f64),
}

// =============================================================================
// RANGES & ALLOCATIONS
// =============================================================================

/// Half-open range `[start, end)` into one class pool.
///
/// Serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct ClassRange {
    pub start: usize,
    pub end: usize,
}

impl ClassRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if both ranges share at least one index.
    pub fn overlaps(&self, other: &ClassRange) -> bool {
        !self.is_empty() && !other.is_empty()
            && self.start < other.end
            && other.start < self.end
    }
}

impl From<[usize; 2]> for ClassRange {
    fn from([start, end]: [usize; 2]) -> Self {
        Self { start, end }
    }
}

impl From<ClassRange> for [usize; 2] {
    fn from(range: ClassRange) -> Self {
        [range.start, range.end]
    }
}

/// Client → class → range.
///
/// Ranges of one class never overlap across clients when produced here,
/// but they need not cover the whole class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexAllocation(BTreeMap<ClientId, BTreeMap<ClassId, ClassRange>>);

impl IndexAllocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the range of `class` for `client`.
    pub fn insert(&mut self, client: ClientId, class: ClassId, range: ClassRange) {
        self.0.entry(client).or_default().insert(class, range);
    }

    /// Range of `class` held by `client`, if any.
    pub fn range(&self, client: ClientId, class: ClassId) -> Option<ClassRange> {
        self.0.get(&client).and_then(|classes| classes.get(&class)).copied()
    }

    /// Number of clients with an entry.
    pub fn client_count(&self) -> usize {
        self.0.len()
    }

    /// Client ids in ascending order.
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.0.keys().copied()
    }

    /// Ranges of one client, by class.
    pub fn client_ranges(&self, client: ClientId) -> Option<&BTreeMap<ClassId, ClassRange>> {
        self.0.get(&client)
    }

    /// Items assigned to `client` across all classes.
    pub fn client_total(&self, client: ClientId) -> usize {
        self.0.get(&client)
            .map(|classes| classes.values().map(ClassRange::len).sum())
            .unwrap_or(0)
    }

    /// Items of `class` assigned across all clients.
    pub fn class_total(&self, class: ClassId) -> usize {
        self.0.values()
            .filter_map(|classes| classes.get(&class))
            .map(ClassRange::len)
            .sum()
    }

    /// Ranges of `class` across clients, in client order.
    pub fn class_ranges(&self, class: ClassId) -> Vec<ClassRange> {
        self.0.values()
            .filter_map(|classes| classes.get(&class))
            .copied()
            .collect()
    }
}

// =============================================================================
// SHAPE FUNCTIONS
// =============================================================================

/// Named weight curve over class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionFn {
    /// Bell curve peaked at the middle class, sharper as bias → 1
    #[default]
    Normal,

    /// Ramp from 1 down to 0, steeper as bias → 1
    Linear,
}

impl DistributionFn {
    pub fn all() -> Vec<DistributionFn> {
        vec![DistributionFn::Normal, DistributionFn::Linear]
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistributionFn::Normal => "normal",
            DistributionFn::Linear => "linear",
        }
    }

    /// Weight of class index `index` out of `classes`.
    ///
    /// The raw curve is blended with `base`: `(raw + base) / (1 + base)`,
    /// which flattens toward uniform as `base → 1`.
    pub fn weight(&self, classes: usize, bias: f64, base: f64, index: usize) -> f64 {
        let i = index as f64;
        let raw = match self {
            DistributionFn::Normal => {
                let center = classes as f64 / 2.0;
                (-(i - center).powi(2) * 3.0 * bias).exp()
            }
            DistributionFn::Linear => {
                if classes <= 1 {
                    1.0
                } else {
                    let bias = bias.min(LINEAR_MAX_BIAS);
                    (1.0 - i / ((1.0 - bias) * (classes - 1) as f64)).max(0.0)
                }
            }
        };

        (raw + base) / (1.0 + base)
    }
}

impl std::fmt::Display for DistributionFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DistributionFn {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(DistributionFn::Normal),
            "linear" => Ok(DistributionFn::Linear),
            _ => Err(CatalogError::UnknownFunction(s.to_string())),
        }
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

fn check_unit(value: f64, err: fn(f64) -> PartitionError) -> Result<f64, PartitionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(err(value))
    }
}

/// Validates a bias value.
pub fn check_bias(bias: f64) -> Result<f64, PartitionError> {
    check_unit(bias, PartitionError::BiasOutOfRange)
}

/// Validates a distribution base value.
pub fn check_base(base: f64) -> Result<f64, PartitionError> {
    check_unit(base, PartitionError::BaseOutOfRange)
}

/// Validates a knowledge amount.
pub fn check_knowledge(knowledge: f64) -> Result<f64, PartitionError> {
    check_unit(knowledge, PartitionError::KnowledgeOutOfRange)
}

/// Shape parameters for [`compute_indices`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionParams {
    pub n_clients: NonZeroUsize,
    pub distribution_fn: DistributionFn,
    pub bias: f64,
    pub base: f64,
    /// Defaults to `1 / n_clients` when unset
    pub knowledge_amount: Option<f64>,
}

impl PartitionParams {
    pub fn new(n_clients: NonZeroUsize, distribution_fn: DistributionFn) -> Self {
        Self {
            n_clients,
            distribution_fn,
            bias: 0.0,
            base: 0.0,
            knowledge_amount: None,
        }
    }

    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    pub fn with_knowledge(mut self, knowledge_amount: f64) -> Self {
        self.knowledge_amount = Some(knowledge_amount);
        self
    }

    /// Effective knowledge amount.
    pub fn knowledge(&self) -> f64 {
        self.knowledge_amount
            .unwrap_or(1.0 / self.n_clients.get() as f64)
    }

    /// Checks every parameter range.
    pub fn validate(&self) -> Result<(), PartitionError> {
        check_bias(self.bias)?;
        check_base(self.base)?;
        check_knowledge(self.knowledge())?;
        Ok(())
    }
}

// =============================================================================
// ALLOCATION
// =============================================================================

/// Even split: each client gets `floor(size / n)` items of every class.
///
/// The remainder of each class is left unassigned.
pub fn even_split(dataset: &Dataset, n_clients: NonZeroUsize) -> IndexAllocation {
    let n = n_clients.get();
    let mut allocation = IndexAllocation::new();

    for &(class_id, size) in dataset.classes {
        let chunk = size / n;
        for client in 0..n {
            let start = client * chunk;
            allocation.insert(client as ClientId, class_id, ClassRange::new(start, start + chunk));
        }
    }

    allocation
}

/// L1-normalized class weights with the class index rotated by `offset`.
///
/// With `offset = 0` this is the base curve, used for previews.
pub fn normalize_distribution(
    dataset: &Dataset,
    distribution_fn: DistributionFn,
    bias: f64,
    base: f64,
    offset: usize,
) -> Vec<f64> {
    let classes = dataset.num_classes();
    let raw: Vec<f64> = (0..classes)
        .map(|i| distribution_fn.weight(classes, bias, base, (i + offset) % classes))
        .collect();

    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        return vec![1.0 / classes as f64; classes];
    }

    raw.into_iter().map(|w| w / sum).collect()
}

/// Class probabilities for one client.
pub fn client_class_distribution(
    dataset: &Dataset,
    distribution_fn: DistributionFn,
    bias: f64,
    base: f64,
    client: ClientId,
) -> Vec<f64> {
    normalize_distribution(dataset, distribution_fn, bias, base, client as usize)
}

/// Scales back every class whose requested items exceed its pool.
///
/// `weights[client][class]` are item counts. Each iteration resolves one
/// overflowing class to exactly 1.0 of its capacity; rescaling a class never
/// touches another class's total, so the loop runs at most once per class.
/// Returns the number of iterations.
pub(crate) fn clip_overflow(class_sizes: &[usize], weights: &mut [Vec<f64>]) -> usize {
    let mut requested: Vec<f64> = class_sizes
        .iter()
        .enumerate()
        .map(|(class, &size)| {
            let total: f64 = weights.iter().map(|row| row[class]).sum();
            total / size as f64
        })
        .collect();

    let mut iterations = 0;
    while let Some(class) = requested.iter().position(|&fraction| fraction > 1.0) {
        let scale = 1.0 / requested[class];
        for row in weights.iter_mut() {
            row[class] *= scale;
        }
        requested[class] = 1.0;
        iterations += 1;

        debug!(class, scale, "clipped overflowing class");
    }

    iterations
}

/// Skewed allocation.
///
/// Per client and class the requested item count is
/// `classSize * knowledge * numClasses * p`, where `p` is the client's
/// rotated class probability. With a flat curve and `knowledge = 1/n` this
/// is roughly `classSize / n`.
pub fn compute_indices(
    dataset: &Dataset,
    params: &PartitionParams,
) -> Result<IndexAllocation, PartitionError> {
    params.validate()?;

    let n = params.n_clients.get();
    let classes = dataset.num_classes();
    let knowledge = params.knowledge();
    let sizes: Vec<usize> = dataset.class_sizes().collect();

    let mut weights: Vec<Vec<f64>> = (0..n)
        .map(|client| {
            client_class_distribution(
                dataset,
                params.distribution_fn,
                params.bias,
                params.base,
                client as ClientId,
            )
            .into_iter()
            .zip(&sizes)
            .map(|(p, &size)| size as f64 * knowledge * classes as f64 * p)
            .collect()
        })
        .collect();

    let clipped = clip_overflow(&sizes, &mut weights);
    debug!(clients = n, classes, clipped, "computed skewed weights");

    let mut allocation = IndexAllocation::new();
    for (class, &(class_id, size)) in dataset.classes.iter().enumerate() {
        let mut start = 0;
        for (client, row) in weights.iter().enumerate() {
            let len = row[class].max(0.0).floor() as usize;
            debug_assert!(
                start + len <= size,
                "class {} overflows after clipping: {} > {}",
                class_id,
                start + len,
                size
            );
            let end = start + len;
            allocation.insert(client as ClientId, class_id, ClassRange::new(start, end));
            start = end;
        }
    }

    Ok(allocation)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DatasetId;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn assert_disjoint(allocation: &IndexAllocation, dataset: &Dataset) {
        for &(class_id, size) in dataset.classes {
            let ranges = allocation.class_ranges(class_id);
            for (i, a) in ranges.iter().enumerate() {
                assert!(a.start <= a.end && a.end <= size);
                for b in &ranges[i + 1..] {
                    assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_even_split_mnist() {
        let mnist = DatasetId::Mnist.dataset();
        let allocation = even_split(mnist, nz(10));

        assert_eq!(allocation.client_count(), 10);
        // class 0 has 5923 items -> 592 per client, 3 left over
        assert_eq!(allocation.range(0, 0), Some(ClassRange::new(0, 592)));
        assert_eq!(allocation.range(9, 0), Some(ClassRange::new(5328, 5920)));
        assert_eq!(allocation.class_total(0), 5920);
        assert_disjoint(&allocation, mnist);
    }

    #[test]
    fn test_even_split_more_clients_than_items() {
        let cifar = DatasetId::Cifar10.dataset();
        let allocation = even_split(cifar, nz(6000));

        assert_eq!(allocation.range(5999, 3), Some(ClassRange::new(0, 0)));
        assert_eq!(allocation.class_total(3), 0);
    }

    #[test]
    fn test_normal_weight_peaks_in_middle() {
        let f = DistributionFn::Normal;
        let middle = f.weight(10, 0.5, 0.0, 5);
        let edge = f.weight(10, 0.5, 0.0, 0);

        assert_relative_eq!(middle, 1.0);
        assert!(edge < middle);
    }

    #[test]
    fn test_linear_weight_full_bias() {
        let f = DistributionFn::Linear;

        assert_relative_eq!(f.weight(10, 1.0, 0.0, 0), 1.0);
        assert_relative_eq!(f.weight(10, 1.0, 0.0, 1), 0.0);
        assert!(f.weight(10, 1.0, 0.0, 1).is_finite());
    }

    #[test]
    fn test_base_blends_toward_uniform() {
        let f = DistributionFn::Linear;
        let w = f.weight(10, 0.5, 1.0, 9);

        // raw weight at the far end is 0, base 1 lifts it to 0.5
        assert_relative_eq!(w, 0.5);
    }

    #[test]
    fn test_rotation_shifts_emphasis() {
        let mnist = DatasetId::Mnist.dataset();
        let d0 = client_class_distribution(mnist, DistributionFn::Linear, 0.5, 0.0, 0);
        let d3 = client_class_distribution(mnist, DistributionFn::Linear, 0.5, 0.0, 3);

        // client 3 sees shape index 0 at class 7
        assert_relative_eq!(d0[0], d3[7]);
    }

    #[test]
    fn test_uniform_matches_even_split_size() {
        let fashion = DatasetId::FashionMnist.dataset();
        let params = PartitionParams::new(nz(10), DistributionFn::Normal);
        let allocation = compute_indices(fashion, &params).unwrap();

        for client in 0..10 {
            assert_eq!(allocation.range(client, 0).unwrap().len(), 600);
        }
    }

    #[test]
    fn test_zero_knowledge_is_empty() {
        let mnist = DatasetId::Mnist.dataset();
        let params = PartitionParams::new(nz(5), DistributionFn::Normal)
            .with_bias(0.7)
            .with_knowledge(0.0);
        let allocation = compute_indices(mnist, &params).unwrap();

        assert_eq!(allocation.client_count(), 5);
        for client in allocation.clients() {
            assert_eq!(allocation.client_total(client), 0);
        }
    }

    #[test]
    fn test_overflow_is_clipped_to_capacity() {
        let cifar = DatasetId::Cifar10.dataset();
        let params = PartitionParams::new(nz(10), DistributionFn::Linear)
            .with_bias(0.9)
            .with_knowledge(1.0);
        let allocation = compute_indices(cifar, &params).unwrap();

        for &(class_id, size) in cifar.classes {
            assert!(allocation.class_total(class_id) <= size);
            // clipped classes are filled up to flooring loss
            assert!(allocation.class_total(class_id) + 10 >= size);
        }
        assert_disjoint(&allocation, cifar);
    }

    #[test]
    fn test_single_client_takes_each_whole_class() {
        let mnist = DatasetId::Mnist.dataset();
        let params = PartitionParams::new(nz(1), DistributionFn::Normal)
            .with_bias(0.0)
            .with_knowledge(1.0);
        let allocation = compute_indices(mnist, &params).unwrap();

        for &(class_id, size) in mnist.classes {
            let range = allocation.range(0, class_id).unwrap();
            assert_eq!(range.start, 0);
            assert!(range.end <= size && range.end + 1 >= size);
        }
    }

    #[test]
    fn test_clip_iterations_bounded() {
        let sizes = vec![100, 100, 100];
        let mut weights = vec![vec![80.0, 10.0, 200.0], vec![80.0, 10.0, 200.0]];

        let iterations = clip_overflow(&sizes, &mut weights);

        assert_eq!(iterations, 2);
        assert_relative_eq!(weights[0][0] + weights[1][0], 100.0);
        assert_relative_eq!(weights[0][1], 10.0);
        assert_relative_eq!(weights[0][2] + weights[1][2], 100.0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mnist = DatasetId::Mnist.dataset();
        let params = PartitionParams::new(nz(3), DistributionFn::Normal).with_bias(1.5);

        assert_eq!(
            compute_indices(mnist, &params),
            Err(PartitionError::BiasOutOfRange(1.5))
        );

        let params = PartitionParams::new(nz(3), DistributionFn::Normal).with_knowledge(-0.1);
        assert!(matches!(
            compute_indices(mnist, &params),
            Err(PartitionError::KnowledgeOutOfRange(_))
        ));
    }

    #[test]
    fn test_range_serializes_as_pair() {
        let json = serde_json::to_string(&ClassRange::new(3, 9)).unwrap();
        assert_eq!(json, "[3,9]");

        let mut allocation = IndexAllocation::new();
        allocation.insert(0, 1, ClassRange::new(0, 5));
        let json = serde_json::to_string(&allocation).unwrap();
        assert_eq!(json, r#"{"0":{"1":[0,5]}}"#);

        let back: IndexAllocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, allocation);
    }

    fn any_dataset() -> impl Strategy<Value = DatasetId> {
        prop_oneof![
            Just(DatasetId::Mnist),
            Just(DatasetId::Cifar10),
            Just(DatasetId::FashionMnist),
        ]
    }

    fn any_fn() -> impl Strategy<Value = DistributionFn> {
        prop_oneof![Just(DistributionFn::Normal), Just(DistributionFn::Linear)]
    }

    proptest! {
        #[test]
        fn prop_even_split_disjoint(id in any_dataset(), n in 1usize..64) {
            let dataset = id.dataset();
            let allocation = even_split(dataset, nz(n));

            for &(class_id, size) in dataset.classes {
                for range in allocation.class_ranges(class_id) {
                    prop_assert_eq!(range.len(), size / n);
                }
            }
            assert_disjoint(&allocation, dataset);
        }

        #[test]
        fn prop_client_distribution_sums_to_one(
            id in any_dataset(),
            f in any_fn(),
            bias in 0.0f64..=1.0,
            base in 0.0f64..=1.0,
            client in 0u32..50,
        ) {
            let d = client_class_distribution(id.dataset(), f, bias, base, client);
            let sum: f64 = d.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_compute_indices_within_capacity(
            id in any_dataset(),
            f in any_fn(),
            n in 1usize..40,
            bias in 0.0f64..=1.0,
            base in 0.0f64..=1.0,
            knowledge in 0.0f64..=1.0,
        ) {
            let dataset = id.dataset();
            let params = PartitionParams::new(nz(n), f)
                .with_bias(bias)
                .with_base(base)
                .with_knowledge(knowledge);
            let allocation = compute_indices(dataset, &params).unwrap();

            prop_assert_eq!(allocation.client_count(), n);
            for &(class_id, size) in dataset.classes {
                prop_assert!(allocation.class_total(class_id) <= size);
            }
            assert_disjoint(&allocation, dataset);
        }

        #[test]
        fn prop_clip_terminates_within_class_count(
            rows in proptest::collection::vec(
                proptest::collection::vec(0.0f64..5000.0, 10),
                1..20,
            ),
        ) {
            let sizes = vec![1000usize; 10];
            let mut weights = rows;
            let iterations = clip_overflow(&sizes, &mut weights);

            prop_assert!(iterations <= sizes.len());
            for class in 0..sizes.len() {
                let total: f64 = weights.iter().map(|row| row[class]).sum();
                prop_assert!(total <= 1000.0 + 1e-6);
            }
        }
    }
}
