//! Experiment tracking: runs with parameters, metrics and artifacts.
//!
//! [`FileTracker`] keeps one directory per run under `<root>/runs`:
//!
//! ```text
//! <root>/runs/<run_id>/run.json
//! <root>/runs/<run_id>/artifacts/<name>
//! ```

use crate::error::TrackingError;
use crate::params::BoosterParams;
use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

type Result<T> = std::result::Result<T, TrackingError>;

/// Opaque run identifier.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Fresh random identifier of 32 hex digits.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("{:016x}{:016x}", rng.next_u64(), rng.next_u64()))
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RunStatus {
    /// Started and not yet ended.
    Running,
    /// Ended normally.
    Finished,
    /// Ended with an error.
    Failed,
}

/// Everything recorded about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Identifier.
    pub run_id: RunId,
    /// Experiment name.
    pub experiment: String,
    /// Current state.
    pub status: RunStatus,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time, once ended.
    pub ended_at: Option<DateTime<Utc>>,
    /// Free-form tags.
    pub tags: BTreeMap<String, String>,
    /// Booster parameters, when logged.
    pub params: Option<BoosterParams>,
    /// Latest value of each metric.
    pub metrics: BTreeMap<String, f64>,
    /// Artifact names relative to the run's artifact directory.
    pub artifacts: Vec<String>,
}

impl RunRecord {
    /// Value of one metric.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// Store of experiment runs.
pub trait ExperimentTracker {
    /// Open a run in `experiment`.
    fn start_run(&self, experiment: &str, tags: BTreeMap<String, String>) -> Result<RunId>;

    /// Record the parameters of an open run.
    fn log_params(&self, run: &RunId, params: &BoosterParams) -> Result<()>;

    /// Record a metric of an open run, replacing an earlier value.
    fn log_metric(&self, run: &RunId, key: &str, value: f64) -> Result<()>;

    /// Store `bytes` as artifact `name` of an open run and return its path.
    fn log_artifact(&self, run: &RunId, name: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Close a run.
    fn end_run(&self, run: &RunId, status: RunStatus) -> Result<()>;

    /// Read one run.
    fn get_run(&self, run: &RunId) -> Result<RunRecord>;

    /// Finished runs of `experiment` carrying `metric`, best (lowest) first.
    fn search_runs(&self, experiment: &str, metric: &str, max_results: usize) -> Result<Vec<RunRecord>>;

    /// Directory holding a run's artifacts.
    fn artifact_dir(&self, run: &RunId) -> Result<PathBuf>;
}

/// Tracker backed by JSON files.
#[derive(Debug, Clone)]
pub struct FileTracker {
    root: PathBuf,
}

impl FileTracker {
    /// Tracker rooted at `root`; directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Tracking root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn run_dir(&self, run: &RunId) -> PathBuf {
        self.runs_dir().join(run.as_str())
    }

    fn write(&self, record: &RunRecord) -> Result<()> {
        let dir = self.run_dir(&record.run_id);
        fs::create_dir_all(&dir)?;
        serde_json::to_writer_pretty(BufWriter::new(File::create(dir.join("run.json"))?), record)?;
        Ok(())
    }

    fn update(&self, run: &RunId, f: impl FnOnce(&mut RunRecord)) -> Result<()> {
        let mut record = self.get_run(run)?;
        if record.status != RunStatus::Running {
            return Err(TrackingError::RunClosed(run.to_string()));
        }
        f(&mut record);
        self.write(&record)
    }
}

impl ExperimentTracker for FileTracker {
    fn start_run(&self, experiment: &str, tags: BTreeMap<String, String>) -> Result<RunId> {
        let run_id = RunId::generate();
        self.write(&RunRecord {
            run_id: run_id.clone(),
            experiment: experiment.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            tags,
            params: None,
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        })?;
        debug!(%run_id, experiment, "run started");
        Ok(run_id)
    }

    fn log_params(&self, run: &RunId, params: &BoosterParams) -> Result<()> {
        self.update(run, |r| r.params = Some(*params))
    }

    fn log_metric(&self, run: &RunId, key: &str, value: f64) -> Result<()> {
        self.update(run, |r| {
            r.metrics.insert(key.to_string(), value);
        })
    }

    fn log_artifact(&self, run: &RunId, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let relative = Path::new(name);
        if name.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(TrackingError::InvalidArtifact(name.to_string()));
        }
        let path = self.artifact_dir(run)?.join(relative);
        self.update(run, |r| {
            if !r.artifacts.iter().any(|a| a == name) {
                r.artifacts.push(name.to_string());
            }
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(path)
    }

    fn end_run(&self, run: &RunId, status: RunStatus) -> Result<()> {
        self.update(run, |r| {
            r.status = status;
            r.ended_at = Some(Utc::now());
        })?;
        info!(run_id = %run, %status, "run ended");
        Ok(())
    }

    fn get_run(&self, run: &RunId) -> Result<RunRecord> {
        let path = self.run_dir(run).join("run.json");
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TrackingError::RunNotFound(run.to_string()),
            _ => TrackingError::Io(e),
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn search_runs(&self, experiment: &str, metric: &str, max_results: usize) -> Result<Vec<RunRecord>> {
        let dir = self.runs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.path().join("run.json").exists() {
                continue;
            }
            let record = self.get_run(&RunId::from(entry.file_name().to_string_lossy().as_ref()))?;
            if record.experiment == experiment
                && record.status == RunStatus::Finished
                && record.metric(metric).is_some_and(f64::is_finite)
            {
                runs.push(record);
            }
        }
        runs.sort_by(|a, b| {
            let (a, b) = (a.metric(metric).unwrap_or(f64::INFINITY), b.metric(metric).unwrap_or(f64::INFINITY));
            a.total_cmp(&b)
        });
        runs.truncate(max_results);
        Ok(runs)
    }

    fn artifact_dir(&self, run: &RunId) -> Result<PathBuf> {
        Ok(self.run_dir(run).join("artifacts"))
    }
}
