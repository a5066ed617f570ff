//! Places a model can be loaded from.

use crate::error::{PredictError, Result};
use hobart_model::{
    ExperimentTracker, FeatureVectorizer, GradientBoostedTrees, MODEL_ARTIFACT_DIR, MODEL_FILE,
    ModelRegistry, RunId, Stage, VECTORIZER_FILE,
};
use std::path::{Path, PathBuf};

/// Model version reported for the bundled example model.
pub const LOCAL_VERSION: &str = "test";

/// A booster with the vectorizer it was trained with.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// Fitted booster.
    pub booster: GradientBoostedTrees,
    /// Fitted vectorizer.
    pub vectorizer: FeatureVectorizer,
    /// Version attached to every prediction.
    pub version: String,
}

impl LoadedModel {
    /// Read `model.json` and `dv.json` from `dir`.
    pub fn from_dir(dir: &Path, version: impl Into<String>) -> Result<Self> {
        let booster = GradientBoostedTrees::load(dir.join(MODEL_FILE))?;
        let vectorizer = FeatureVectorizer::load(dir.join(VECTORIZER_FILE))?;
        if booster.n_features() != vectorizer.n_features() {
            return Err(PredictError::SchemaMismatch(format!(
                "booster expects {} features, vectorizer produces {}",
                booster.n_features(),
                vectorizer.n_features()
            )));
        }
        Ok(Self {
            booster,
            vectorizer,
            version: version.into(),
        })
    }
}

/// Something that can produce a [`LoadedModel`].
pub trait ModelSource {
    /// Human-readable description used in logs and errors.
    fn describe(&self) -> String;

    /// Load the model.
    fn load(&self) -> Result<LoadedModel>;
}

/// Newest version of a registered model in a stage.
#[derive(Debug)]
pub struct RegistrySource<R> {
    registry: R,
    model_name: String,
    stage: Stage,
}

impl<R: ModelRegistry> RegistrySource<R> {
    /// Source for `model_name` in `stage`.
    pub fn new(registry: R, model_name: impl Into<String>, stage: Stage) -> Self {
        Self {
            registry,
            model_name: model_name.into(),
            stage,
        }
    }
}

impl<R: ModelRegistry> ModelSource for RegistrySource<R> {
    fn describe(&self) -> String {
        format!("registry {}@{}", self.model_name, self.stage)
    }

    fn load(&self) -> Result<LoadedModel> {
        let version = self
            .registry
            .latest(&self.model_name, self.stage)?
            .ok_or_else(|| PredictError::SourceUnavailable {
                source_name: self.describe(),
                reason: "no version in stage".to_string(),
            })?;
        LoadedModel::from_dir(&version.source, version.run_id.to_string())
    }
}

/// Model artifacts of one tracked run.
#[derive(Debug)]
pub struct RunArtifactSource<T> {
    tracker: T,
    run_id: RunId,
}

impl<T: ExperimentTracker> RunArtifactSource<T> {
    /// Source for the artifacts of `run_id`.
    pub fn new(tracker: T, run_id: impl Into<RunId>) -> Self {
        Self {
            tracker,
            run_id: run_id.into(),
        }
    }
}

impl<T: ExperimentTracker> ModelSource for RunArtifactSource<T> {
    fn describe(&self) -> String {
        format!("run {}", self.run_id)
    }

    fn load(&self) -> Result<LoadedModel> {
        let dir = self.tracker.artifact_dir(&self.run_id)?.join(MODEL_ARTIFACT_DIR);
        LoadedModel::from_dir(&dir, self.run_id.to_string())
    }
}

/// Model files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalSource {
    dir: PathBuf,
}

impl LocalSource {
    /// Source reading `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModelSource for LocalSource {
    fn describe(&self) -> String {
        format!("local {}", self.dir.display())
    }

    fn load(&self) -> Result<LoadedModel> {
        LoadedModel::from_dir(&self.dir, LOCAL_VERSION)
    }
}
