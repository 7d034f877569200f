//! Loading functions: how much of its local data a client may train on at
//! each round.

use crate::catalog::CatalogError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Floor mixed into every loading curve, so round 0 never loads nothing.
pub const LOADING_BASE: f64 = 0.1;

/// Named loading curve over rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingFn {
    #[default]
    Linear,
    Quadratic,
    Cubic,
    #[serde(rename = "logaritmic", alias = "logarithmic")]
    Logarithmic,
    Constant,
    Random,
}

impl LoadingFn {
    pub fn all() -> Vec<LoadingFn> {
        vec![
            LoadingFn::Linear,
            LoadingFn::Quadratic,
            LoadingFn::Cubic,
            LoadingFn::Logarithmic,
            LoadingFn::Constant,
            LoadingFn::Random,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoadingFn::Linear => "linear",
            LoadingFn::Quadratic => "quadratic",
            LoadingFn::Cubic => "cubic",
            LoadingFn::Logarithmic => "logaritmic",
            LoadingFn::Constant => "constant",
            LoadingFn::Random => "random",
        }
    }

    /// Unblended curve value in `[0, 1]`.
    pub fn raw<R: Rng>(&self, round: usize, n_rounds: usize, rng: &mut R) -> f64 {
        let progress = (round + 1) as f64 / n_rounds.max(1) as f64;
        match self {
            LoadingFn::Linear => progress,
            LoadingFn::Quadratic => progress.powi(2),
            LoadingFn::Cubic => progress.powi(3),
            LoadingFn::Logarithmic => {
                if n_rounds <= 1 {
                    1.0
                } else {
                    ((round + 1) as f64).ln() / (n_rounds as f64).ln()
                }
            }
            LoadingFn::Constant => 1.0,
            LoadingFn::Random => rng.gen::<f64>(),
        }
    }

    /// Fraction of data available at `round`, blended with [`LOADING_BASE`].
    pub fn value<R: Rng>(&self, round: usize, n_rounds: usize, rng: &mut R) -> f64 {
        (self.raw(round, n_rounds, rng) + LOADING_BASE) / (1.0 + LOADING_BASE)
    }
}

impl std::fmt::Display for LoadingFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for LoadingFn {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(LoadingFn::Linear),
            "quadratic" => Ok(LoadingFn::Quadratic),
            "cubic" => Ok(LoadingFn::Cubic),
            "logaritmic" | "logarithmic" => Ok(LoadingFn::Logarithmic),
            "constant" => Ok(LoadingFn::Constant),
            "random" => Ok(LoadingFn::Random),
            _ => Err(CatalogError::UnknownFunction(s.to_string())),
        }
    }
}

/// Per-round loading series of length `n_rounds`.
///
/// `seed` only matters for [`LoadingFn::Random`]; the same seed always
/// yields the same series.
pub fn loading_series(loading_fn: LoadingFn, n_rounds: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n_rounds)
        .map(|round| loading_fn.value(round, n_rounds, &mut rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_series_ends_at_one() {
        let series = loading_series(LoadingFn::Linear, 10, 0);

        assert_eq!(series.len(), 10);
        assert_relative_eq!(series[0], (0.1 + 0.1) / 1.1);
        assert_relative_eq!(series[9], 1.0);
    }

    #[test]
    fn test_curves_are_monotonic() {
        for f in [LoadingFn::Linear, LoadingFn::Quadratic, LoadingFn::Cubic, LoadingFn::Logarithmic] {
            let series = loading_series(f, 8, 0);
            assert!(series.windows(2).all(|w| w[0] <= w[1]), "{} not monotonic", f);
        }
    }

    #[test]
    fn test_logarithmic_single_round() {
        let series = loading_series(LoadingFn::Logarithmic, 1, 0);
        assert_relative_eq!(series[0], 1.0);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = loading_series(LoadingFn::Random, 16, 42);
        let b = loading_series(LoadingFn::Random, 16, 42);

        assert_eq!(a, b);
        assert!(a.iter().all(|v| (LOADING_BASE / 1.1..=1.0).contains(v)));
    }

    #[test]
    fn test_wire_name_keeps_legacy_spelling() {
        let json = serde_json::to_string(&LoadingFn::Logarithmic).unwrap();
        assert_eq!(json, "\"logaritmic\"");

        let parsed: LoadingFn = serde_json::from_str("\"logarithmic\"").unwrap();
        assert_eq!(parsed, LoadingFn::Logarithmic);
    }
}
