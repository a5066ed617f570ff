//! Booster hyperparameters and the space they are tuned over.

use crate::error::{ModelError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Hyperparameters of [`GradientBoostedTrees`](crate::GradientBoostedTrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    /// Number of boosting rounds.
    pub n_estimators: usize,
    /// Maximum tree depth; the root is depth 0.
    pub max_depth: usize,
    /// Shrinkage applied to every leaf.
    pub learning_rate: f64,
    /// L1 penalty on leaf weights.
    pub reg_alpha: f64,
    /// L2 penalty on leaf weights.
    pub reg_lambda: f64,
    /// Minimum hessian sum in each child of a split.
    pub min_child_weight: f64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            learning_rate: 0.1,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

impl BoosterParams {
    /// Reject values the booster cannot train with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &'static str, reason: String| Err(ModelError::InvalidParams { name, reason });
        if self.n_estimators == 0 {
            return invalid("n_estimators", "must be at least 1".to_string());
        }
        if self.max_depth == 0 {
            return invalid("max_depth", "must be at least 1".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return invalid("learning_rate", format!("{} is outside (0, 1]", self.learning_rate));
        }
        for (name, value) in [
            ("reg_alpha", self.reg_alpha),
            ("reg_lambda", self.reg_lambda),
            ("min_child_weight", self.min_child_weight),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return invalid(name, format!("{value} is not a finite non-negative number"));
            }
        }
        Ok(())
    }
}

/// Prior over one hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// `round(uniform(low, high) / q) · q`.
    QUniform {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
        /// Step.
        q: f64,
    },
    /// `exp(uniform(low, high))`; bounds are in log space.
    LogUniform {
        /// Lower bound of the log.
        low: f64,
        /// Upper bound of the log.
        high: f64,
    },
}

impl Distribution {
    /// Draw one value.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::QUniform { low, high, q } => (rng.gen_range(low..=high) / q).round() * q,
            Self::LogUniform { low, high } => rng.gen_range(low..=high).exp(),
        }
    }

    /// Smallest and largest value a draw can take.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Self::QUniform { low, high, q } => ((low / q).round() * q, (high / q).round() * q),
            Self::LogUniform { low, high } => (low.exp(), high.exp()),
        }
    }
}

/// Priors for every tuned hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    /// Tree depth.
    pub max_depth: Distribution,
    /// Boosting rounds.
    pub n_estimators: Distribution,
    /// Shrinkage.
    pub learning_rate: Distribution,
    /// L1 penalty.
    pub reg_alpha: Distribution,
    /// L2 penalty.
    pub reg_lambda: Distribution,
    /// Minimum child weight.
    pub min_child_weight: Distribution,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            max_depth: Distribution::QUniform { low: 5.0, high: 100.0, q: 5.0 },
            n_estimators: Distribution::QUniform { low: 50.0, high: 300.0, q: 50.0 },
            learning_rate: Distribution::LogUniform { low: -7.0, high: 0.0 },
            reg_alpha: Distribution::LogUniform { low: -5.0, high: -1.0 },
            reg_lambda: Distribution::LogUniform { low: -6.0, high: -1.0 },
            min_child_weight: Distribution::LogUniform { low: -1.0, high: 3.0 },
        }
    }
}

impl SearchSpace {
    /// Draw one full parameter set.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> BoosterParams {
        let count = |v: f64| v.round().max(1.0) as usize;
        BoosterParams {
            max_depth: count(self.max_depth.sample(rng)),
            n_estimators: count(self.n_estimators.sample(rng)),
            learning_rate: self.learning_rate.sample(rng).min(1.0),
            reg_alpha: self.reg_alpha.sample(rng),
            reg_lambda: self.reg_lambda.sample(rng),
            min_child_weight: self.min_child_weight.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_default_params_valid() {
        BoosterParams::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_params() {
        let params = BoosterParams {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ModelError::InvalidParams { name: "learning_rate", .. })
        ));

        let params = BoosterParams {
            reg_lambda: -1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_samples_stay_in_space() {
        let space = SearchSpace::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let p = space.sample(&mut rng);
            p.validate().unwrap();
            assert_eq!(p.max_depth % 5, 0);
            assert!((5..=100).contains(&p.max_depth));
            assert_eq!(p.n_estimators % 50, 0);
            assert!((50..=300).contains(&p.n_estimators));
            let (lo, hi) = space.reg_alpha.bounds();
            assert!(p.reg_alpha >= lo && p.reg_alpha <= hi);
            assert!(p.learning_rate > 0.0 && p.learning_rate <= 1.0);
        }
    }

    #[test]
    fn test_sampling_is_seeded() {
        let space = SearchSpace::default();
        let a = space.sample(&mut StdRng::seed_from_u64(42));
        let b = space.sample(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
