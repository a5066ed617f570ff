//! Tracked training stages: baseline, tuning and registration.

use crate::booster::GradientBoostedTrees;
use crate::dataset::{Dataset, PreparedData};
use crate::error::{ModelError, Result};
use crate::hpo::{Optimizer, RandomSearch, Trial};
use crate::metrics::rmse;
use crate::params::{BoosterParams, SearchSpace};
use crate::registry::{ModelRegistry, ModelVersion, Stage};
use crate::tracking::{ExperimentTracker, RunId, RunStatus};
use crate::{MODEL_FILE, VECTORIZER_FILE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Experiment of the baseline model.
pub const BASELINE_EXPERIMENT: &str = "stock-1month-return-prediction";

/// Directory, inside a run's artifacts, holding the model files.
pub const MODEL_ARTIFACT_DIR: &str = "model";

/// Settings of the tuning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneConfig {
    /// Experiment receiving one run per trial.
    pub experiment: String,
    /// Number of trials.
    pub max_evals: usize,
    /// Seed of the random search.
    pub seed: u64,
    /// Priors searched.
    pub space: SearchSpace,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            experiment: "stock-return-prediction-hyperopt".to_string(),
            max_evals: 15,
            seed: 42,
            space: SearchSpace::default(),
        }
    }
}

/// Settings of the registration stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// Experiment holding the tuning runs.
    pub hpo_experiment: String,
    /// Experiment receiving the retrained candidates.
    pub experiment: String,
    /// Registered model name.
    pub model_name: String,
    /// Number of tuning runs retrained.
    pub top_n: usize,
    /// Promote the registered version to production.
    pub promote: bool,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            hpo_experiment: TuneConfig::default().experiment,
            experiment: "booster-best-models".to_string(),
            model_name: "booster-best-models".to_string(),
            top_n: 2,
            promote: false,
        }
    }
}

fn booster_tags() -> BTreeMap<String, String> {
    [("model".to_string(), "booster".to_string())].into()
}

fn score(model: &GradientBoostedTrees, data: &Dataset) -> Result<f64> {
    rmse(data.targets.view(), model.predict(data.features.view())?.view())
}

/// Run `body` inside a tracked run, closing it as failed if `body` errors.
fn with_run<T>(
    tracker: &dyn ExperimentTracker,
    experiment: &str,
    body: impl FnOnce(&RunId) -> Result<T>,
) -> Result<(RunId, T)> {
    let run = tracker.start_run(experiment, booster_tags())?;
    match body(&run) {
        Ok(value) => {
            tracker.end_run(&run, RunStatus::Finished)?;
            Ok((run, value))
        }
        Err(e) => {
            if let Err(close) = tracker.end_run(&run, RunStatus::Failed) {
                warn!(run_id = %run, error = %close, "could not close failed run");
            }
            Err(e)
        }
    }
}

/// Fit the baseline booster and log its validation RMSE as `rmse`.
pub fn train(tracker: &dyn ExperimentTracker, data: &PreparedData, experiment: &str) -> Result<(RunId, f64)> {
    let params = BoosterParams::default();
    let (run, rmse) = with_run(tracker, experiment, |run| {
        tracker.log_params(run, &params)?;
        let model = GradientBoostedTrees::fit(params, data.train.features.view(), data.train.targets.view())?;
        let rmse = score(&model, &data.validation)?;
        tracker.log_metric(run, "rmse", rmse)?;
        tracker.log_artifact(run, &format!("{MODEL_ARTIFACT_DIR}/{MODEL_FILE}"), &serde_json::to_vec(&model)?)?;
        Ok(rmse)
    })?;
    info!(run_id = %run, rmse, "baseline trained");
    Ok((run, rmse))
}

/// Search the space with `optimizer`, one tracked run per trial scored by
/// validation RMSE.
pub fn tune(
    tracker: &dyn ExperimentTracker,
    optimizer: &mut dyn Optimizer,
    data: &PreparedData,
    config: &TuneConfig,
) -> Result<Trial> {
    info!(experiment = %config.experiment, trials = config.max_evals, "tuning booster");
    let best = optimizer.minimize(&config.space, config.max_evals, &mut |params: &BoosterParams| {
        let (_, rmse) = with_run(tracker, &config.experiment, |run| {
            tracker.log_params(run, params)?;
            let model = GradientBoostedTrees::fit(*params, data.train.features.view(), data.train.targets.view())?;
            let rmse = score(&model, &data.validation)?;
            tracker.log_metric(run, "rmse", rmse)?;
            Ok(rmse)
        })?;
        Ok(rmse)
    })?;
    info!(rmse = best.loss, ?best.params, "tuning complete");
    Ok(best)
}

/// Tune with a seeded [`RandomSearch`].
pub fn tune_random(tracker: &dyn ExperimentTracker, data: &PreparedData, config: &TuneConfig) -> Result<Trial> {
    tune(tracker, &mut RandomSearch::new(config.seed), data, config)
}

/// Retrain the best tuning runs, log validation and test RMSE with the
/// model and vectorizer, and register the candidate with the lowest test
/// RMSE.
pub fn register(
    tracker: &dyn ExperimentTracker,
    registry: &dyn ModelRegistry,
    data: &PreparedData,
    config: &RegisterConfig,
) -> Result<ModelVersion> {
    let top = tracker.search_runs(&config.hpo_experiment, "rmse", config.top_n)?;
    if top.is_empty() {
        return Err(ModelError::EmptyDataset(format!(
            "no finished runs with rmse in {}",
            config.hpo_experiment
        )));
    }

    let mut best: Option<(RunId, f64)> = None;
    for source in top {
        let params = source.params.ok_or_else(|| ModelError::IncompleteRun {
            run_id: source.run_id.to_string(),
            what: "parameters",
        })?;
        let (run, test_rmse) = with_run(tracker, &config.experiment, |run| {
            let model = GradientBoostedTrees::fit(params, data.train.features.view(), data.train.targets.view())?;
            tracker.log_params(run, &params)?;
            tracker.log_metric(run, "val_rmse", score(&model, &data.validation)?)?;
            let test_rmse = score(&model, &data.test)?;
            tracker.log_metric(run, "test_rmse", test_rmse)?;
            tracker.log_artifact(run, &format!("{MODEL_ARTIFACT_DIR}/{MODEL_FILE}"), &serde_json::to_vec(&model)?)?;
            tracker.log_artifact(
                run,
                &format!("{MODEL_ARTIFACT_DIR}/{VECTORIZER_FILE}"),
                &serde_json::to_vec(&data.vectorizer)?,
            )?;
            Ok(test_rmse)
        })?;
        info!(run_id = %run, tuned_from = %source.run_id, test_rmse, "candidate retrained");
        if best.as_ref().is_none_or(|(_, b)| test_rmse.total_cmp(b).is_lt()) {
            best = Some((run, test_rmse));
        }
    }

    let (run, test_rmse) = best.ok_or_else(|| ModelError::EmptyDataset("no candidates".to_string()))?;
    let source = tracker.artifact_dir(&run)?.join(MODEL_ARTIFACT_DIR);
    let version = registry.register(&config.model_name, &run, &source)?;
    info!(name = %version.name, version = version.version, test_rmse, "best model registered");
    if config.promote {
        return Ok(registry.transition(&version.name, version.version, Stage::Production, true)?);
    }
    Ok(version)
}
