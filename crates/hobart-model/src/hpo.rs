//! Hyperparameter search.

use crate::error::{ModelError, Result};
use crate::params::{BoosterParams, SearchSpace};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One evaluated parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Parameters tried.
    pub params: BoosterParams,
    /// Objective value; lower is better.
    pub loss: f64,
}

/// Strategy that proposes parameter sets and keeps the best.
pub trait Optimizer {
    /// Evaluate `objective` on `max_evals` proposals from `space` and return
    /// the lowest-loss trial. Non-finite losses never win over finite ones.
    fn minimize(
        &mut self,
        space: &SearchSpace,
        max_evals: usize,
        objective: &mut dyn FnMut(&BoosterParams) -> Result<f64>,
    ) -> Result<Trial>;
}

/// Independent draws from the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    rng: StdRng,
}

impl RandomSearch {
    /// Search with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Optimizer for RandomSearch {
    fn minimize(
        &mut self,
        space: &SearchSpace,
        max_evals: usize,
        objective: &mut dyn FnMut(&BoosterParams) -> Result<f64>,
    ) -> Result<Trial> {
        if max_evals == 0 {
            return Err(ModelError::InvalidParams {
                name: "max_evals",
                reason: "must be at least 1".to_string(),
            });
        }
        let rank = |loss: f64| if loss.is_finite() { loss } else { f64::INFINITY };
        let mut best: Option<Trial> = None;
        for i in 0..max_evals {
            let params = space.sample(&mut self.rng);
            let loss = objective(&params)?;
            debug!(trial = i, loss, "trial evaluated");
            if best.is_none_or(|b| rank(loss) < rank(b.loss)) {
                best = Some(Trial { params, loss });
            }
        }
        best.ok_or_else(|| ModelError::InvalidParams {
            name: "max_evals",
            reason: "no trial evaluated".to_string(),
        })
    }
}
