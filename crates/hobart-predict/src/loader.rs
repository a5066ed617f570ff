//! Ordered fallback over model sources.

use crate::error::{PredictError, Result};
use crate::source::{LoadedModel, LocalSource, ModelSource, RegistrySource, RunArtifactSource};
use hobart_model::{FileRegistry, FileTracker, Stage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where the loader looks for a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Registered model name.
    pub model_name: String,
    /// Stage served.
    pub stage: Stage,
    /// Run whose artifacts are tried when the registry has nothing.
    pub run_id: Option<String>,
    /// Bundled example model.
    pub local_dir: PathBuf,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            model_name: "booster-best-models".to_string(),
            stage: Stage::Production,
            run_id: None,
            local_dir: PathBuf::from("artifacts/model"),
        }
    }
}

/// Tries each source in order until one loads.
#[derive(Default)]
pub struct ModelLoader {
    sources: Vec<Box<dyn ModelSource>>,
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.describe()))
            .finish()
    }
}

impl ModelLoader {
    /// Loader with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source.
    pub fn with_source(mut self, source: impl ModelSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Registry, then the configured run, then the local directory, all
    /// resolved against `tracking_root`.
    pub fn from_config(config: &LoaderConfig, tracking_root: &Path) -> Self {
        let mut loader = Self::new().with_source(RegistrySource::new(
            FileRegistry::new(tracking_root),
            config.model_name.clone(),
            config.stage,
        ));
        if let Some(run_id) = &config.run_id {
            loader = loader.with_source(RunArtifactSource::new(
                FileTracker::new(tracking_root),
                run_id.as_str(),
            ));
        }
        loader.with_source(LocalSource::new(config.local_dir.clone()))
    }

    /// First model that loads.
    pub fn load(&self) -> Result<LoadedModel> {
        let mut attempts = Vec::new();
        for source in &self.sources {
            match source.load() {
                Ok(model) => {
                    info!(source = %source.describe(), version = %model.version, "model loaded");
                    return Ok(model);
                }
                Err(e) => {
                    warn!(source = %source.describe(), error = %e, "model source failed");
                    attempts.push(format!("{}: {e}", source.describe()));
                }
            }
        }
        Err(PredictError::NoModelAvailable { attempts })
    }
}
