//! Run configuration.
//!
//! A [`PipelineConfig`] is built once per invocation, from a JSON file or
//! defaults, and passed by reference to every stage. Fields missing from the
//! file keep their defaults.

use crate::error::{PipelineError, Result};
use hobart_features::EngineConfig;
use hobart_model::{RegisterConfig, SplitConfig, TuneConfig};
use hobart_monitor::MonitorConfig;
use hobart_predict::LoaderConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Settings of the raw-data download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// CSV with a `Symbol` column listing the universe.
    pub tickers_path: PathBuf,
    /// Years of history before the current month.
    pub data_span_years: u32,
    /// Tickers fetched at once.
    pub concurrency: usize,
    /// Pause after each provider request, in milliseconds.
    pub rate_limit_ms: u64,
    /// Yahoo symbol of the index.
    pub index_symbol: String,
    /// Yahoo symbol of the volatility index.
    pub vix_symbol: String,
    /// Attempts of the download stage inside `flow`.
    pub attempts: u32,
    /// Pause between attempts, in seconds.
    pub retry_delay_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            tickers_path: PathBuf::from("data/spx_tickers.csv"),
            data_span_years: 3,
            concurrency: 10,
            rate_limit_ms: 1000,
            index_symbol: "^GSPC".to_string(),
            vix_symbol: "^VIX".to_string(),
            attempts: 3,
            retry_delay_secs: 2,
        }
    }
}

/// Everything a pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory of the raw CSV inputs.
    pub raw_dir: PathBuf,
    /// Historical feature table.
    pub features_path: PathBuf,
    /// Production feature records.
    pub records_path: PathBuf,
    /// Vectorizer and encoded splits.
    pub dataset_dir: PathBuf,
    /// Scored historical table.
    pub backfill_path: PathBuf,
    /// SQLite database of monitoring metrics.
    pub metrics_db: PathBuf,
    /// Root of the experiment tracker and model registry.
    pub tracking_root: PathBuf,
    /// Feature windows.
    pub engine: EngineConfig,
    /// Raw-data download.
    pub download: DownloadConfig,
    /// Date split.
    pub split: SplitConfig,
    /// Hyperparameter search.
    pub tune: TuneConfig,
    /// Candidate retraining and registration.
    pub register: RegisterConfig,
    /// Model source chain.
    pub loader: LoaderConfig,
    /// Drift monitoring.
    pub monitor: MonitorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            features_path: PathBuf::from("data/features.parquet"),
            records_path: PathBuf::from("data/json_records.json"),
            dataset_dir: PathBuf::from("data/dataset"),
            backfill_path: PathBuf::from("data/backfill.parquet"),
            metrics_db: PathBuf::from("data/monitoring.db"),
            tracking_root: default_tracking_root(),
            engine: EngineConfig::default(),
            download: DownloadConfig::default(),
            split: SplitConfig::default(),
            tune: TuneConfig::default(),
            register: RegisterConfig::default(),
            loader: LoaderConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

/// `<data dir>/hobart/tracking`, or `./tracking` when the platform has no
/// data directory.
pub fn default_tracking_root() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from("tracking"), |dir| dir.join("hobart").join("tracking"))
}

impl PipelineConfig {
    /// Read a JSON config; a missing file gives the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Check the sections that carry their own validation.
    pub fn validate(&self) -> Result<()> {
        self.split.validate()?;
        self.monitor.validate()?;
        if self.download.concurrency == 0 {
            return Err(PipelineError::Config("download.concurrency must be positive".to_string()));
        }
        if self.download.attempts == 0 {
            return Err(PipelineError::Config("download.attempts must be positive".to_string()));
        }
        Ok(())
    }
}
