//! Registered model versions and their deployment stages.

use crate::error::TrackingError;
use crate::tracking::RunId;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

type Result<T> = std::result::Result<T, TrackingError>;

/// Deployment stage of a model version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Stage {
    /// Registered only.
    #[default]
    None,
    /// Under evaluation.
    Staging,
    /// Serving predictions.
    Production,
    /// Retired.
    Archived,
}

/// One version of a registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Registered model name.
    pub name: String,
    /// Version number, starting at 1.
    pub version: u32,
    /// Run that produced the model.
    pub run_id: RunId,
    /// Directory holding the model and vectorizer files.
    pub source: PathBuf,
    /// Current stage.
    pub stage: Stage,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Store of registered model versions.
pub trait ModelRegistry {
    /// Add a new version of `name` pointing at `source`.
    fn register(&self, name: &str, run_id: &RunId, source: &Path) -> Result<ModelVersion>;

    /// Move a version to `stage`. With `archive_existing`, other versions in
    /// that stage are archived.
    fn transition(&self, name: &str, version: u32, stage: Stage, archive_existing: bool) -> Result<ModelVersion>;

    /// Newest version of `name` in `stage`.
    fn latest(&self, name: &str, stage: Stage) -> Result<Option<ModelVersion>>;

    /// Every version of `name`, oldest first.
    fn versions(&self, name: &str) -> Result<Vec<ModelVersion>>;
}

/// Registry kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    /// Registry stored at `<root>/registry.json`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join("registry.json"),
        }
    }

    fn read_all(&self) -> Result<Vec<ModelVersion>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_reader(BufReader::new(File::open(&self.path)?))?)
    }

    fn write_all(&self, versions: &[ModelVersion]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        serde_json::to_writer_pretty(BufWriter::new(File::create(&self.path)?), versions)?;
        Ok(())
    }
}

impl ModelRegistry for FileRegistry {
    fn register(&self, name: &str, run_id: &RunId, source: &Path) -> Result<ModelVersion> {
        let mut all = self.read_all()?;
        let version = all
            .iter()
            .filter(|v| v.name == name)
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;
        let entry = ModelVersion {
            name: name.to_string(),
            version,
            run_id: run_id.clone(),
            source: source.to_path_buf(),
            stage: Stage::None,
            created_at: Utc::now(),
        };
        all.push(entry.clone());
        self.write_all(&all)?;
        info!(name, version, run_id = %run_id, "registered model version");
        Ok(entry)
    }

    fn transition(&self, name: &str, version: u32, stage: Stage, archive_existing: bool) -> Result<ModelVersion> {
        let mut all = self.read_all()?;
        if !all.iter().any(|v| v.name == name && v.version == version) {
            return Err(TrackingError::VersionNotFound {
                name: name.to_string(),
                version,
            });
        }
        let mut updated = None;
        for v in all.iter_mut().filter(|v| v.name == name) {
            if v.version == version {
                v.stage = stage;
                updated = Some(v.clone());
            } else if archive_existing && v.stage == stage {
                v.stage = Stage::Archived;
            }
        }
        self.write_all(&all)?;
        info!(name, version, %stage, "model version transitioned");
        updated.ok_or_else(|| TrackingError::VersionNotFound {
            name: name.to_string(),
            version,
        })
    }

    fn latest(&self, name: &str, stage: Stage) -> Result<Option<ModelVersion>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|v| v.name == name && v.stage == stage)
            .max_by_key(|v| v.version))
    }

    fn versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let mut versions: Vec<_> = self.read_all()?.into_iter().filter(|v| v.name == name).collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(name: &str) -> (FileRegistry, PathBuf) {
        let root = std::env::temp_dir().join(format!("hobart_registry_{name}"));
        fs::remove_dir_all(&root).ok();
        (FileRegistry::new(&root), root)
    }

    #[test]
    fn test_versions_increment_per_name() {
        let (registry, root) = registry("increment");
        let a1 = registry.register("a", &RunId::from("r1"), Path::new("/x")).unwrap();
        let a2 = registry.register("a", &RunId::from("r2"), Path::new("/y")).unwrap();
        let b1 = registry.register("b", &RunId::from("r3"), Path::new("/z")).unwrap();
        assert_eq!((a1.version, a2.version, b1.version), (1, 2, 1));
        assert_eq!(a2.stage, Stage::None);
        assert_eq!(registry.versions("a").unwrap().len(), 2);
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_promotion_archives_previous_production() {
        let (registry, root) = registry("promote");
        registry.register("m", &RunId::from("r1"), Path::new("/1")).unwrap();
        registry.register("m", &RunId::from("r2"), Path::new("/2")).unwrap();

        registry.transition("m", 1, Stage::Production, true).unwrap();
        assert_eq!(registry.latest("m", Stage::Production).unwrap().unwrap().version, 1);

        registry.transition("m", 2, Stage::Production, true).unwrap();
        let versions = registry.versions("m").unwrap();
        assert_eq!(versions[0].stage, Stage::Archived);
        assert_eq!(versions[1].stage, Stage::Production);
        assert_eq!(
            registry.latest("m", Stage::Production).unwrap().unwrap().run_id,
            RunId::from("r2")
        );
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_unknown_version() {
        let (registry, root) = registry("unknown");
        assert!(matches!(
            registry.transition("m", 3, Stage::Staging, false),
            Err(TrackingError::VersionNotFound { version: 3, .. })
        ));
        assert_eq!(registry.latest("m", Stage::Production).unwrap(), None);
        fs::remove_dir_all(root).ok();
    }
}
