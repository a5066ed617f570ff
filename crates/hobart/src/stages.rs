//! Pipeline stages.
//!
//! Each stage reads its inputs from the paths in [`PipelineConfig`], writes
//! its outputs back there and returns what it produced.

use crate::config::PipelineConfig;
use crate::error::Result;
use chrono::NaiveDate;
use hobart_data::files::RawLayout;
use hobart_features::{FeatureEngine, FeatureTable, MarketData};
use hobart_model::{
    BASELINE_EXPERIMENT, FileRegistry, FileTracker, ModelVersion, PreparedData, RunId, Trial,
};
use hobart_monitor::{MonthlyMetrics, SqliteSink, run_monitoring};
use hobart_predict::{BackfillTable, LoadedModel, ModelLoader, Prediction};
use std::path::Path;
use tracing::info;

fn market_data(config: &PipelineConfig) -> Result<MarketData> {
    Ok(MarketData::load(&RawLayout::new(&config.raw_dir))?)
}

fn tracker(config: &PipelineConfig) -> FileTracker {
    FileTracker::new(&config.tracking_root)
}

/// Build the historical feature table up to `end` and write it to
/// `features_path`.
pub fn transform(config: &PipelineConfig, end: NaiveDate) -> Result<FeatureTable> {
    let data = market_data(config)?;
    let table = FeatureEngine::with_config(&data, config.engine.clone()).rolling(end)?;
    table.save(&config.features_path)?;
    info!(
        rows = table.len(),
        months = table.dates().len(),
        path = %config.features_path.display(),
        "feature table written"
    );
    Ok(table)
}

/// Build the production records of one anchor and write them to
/// `records_path`.
pub fn latest(config: &PipelineConfig, anchor: NaiveDate) -> Result<FeatureTable> {
    let data = market_data(config)?;
    let table = FeatureEngine::with_config(&data, config.engine.clone()).latest(anchor)?;
    table.write_json(&config.records_path)?;
    info!(%anchor, rows = table.len(), path = %config.records_path.display(), "records written");
    Ok(table)
}

/// Split and vectorize the feature table into `dataset_dir`.
pub fn preprocess(config: &PipelineConfig) -> Result<PreparedData> {
    let table = FeatureTable::load(&config.features_path)?;
    let data = hobart_model::prepare(&table, &config.split)?;
    data.save(&config.dataset_dir)?;
    info!(
        train = data.train.len(),
        validation = data.validation.len(),
        test = data.test.len(),
        features = data.vectorizer.n_features(),
        "dataset prepared"
    );
    Ok(data)
}

/// Fit the baseline model; returns its run and validation RMSE.
pub fn train(config: &PipelineConfig) -> Result<(RunId, f64)> {
    let data = PreparedData::load(&config.dataset_dir)?;
    Ok(hobart_model::train(&tracker(config), &data, BASELINE_EXPERIMENT)?)
}

/// Run the hyperparameter search; returns the best trial.
pub fn tune(config: &PipelineConfig) -> Result<Trial> {
    let data = PreparedData::load(&config.dataset_dir)?;
    Ok(hobart_model::tune_random(&tracker(config), &data, &config.tune)?)
}

/// Retrain the best tuning runs and register the winner.
pub fn register(config: &PipelineConfig) -> Result<ModelVersion> {
    let data = PreparedData::load(&config.dataset_dir)?;
    let registry = FileRegistry::new(&config.tracking_root);
    Ok(hobart_model::register(&tracker(config), &registry, &data, &config.register)?)
}

/// Load the serving model through the configured source chain.
pub fn load_model(config: &PipelineConfig) -> Result<LoadedModel> {
    Ok(ModelLoader::from_config(&config.loader, &config.tracking_root).load()?)
}

/// Score the production records stored at `records`.
pub fn predict(config: &PipelineConfig, records: &Path) -> Result<Vec<Prediction>> {
    let model = load_model(config)?;
    let table = FeatureTable::read_json(records)?;
    Ok(hobart_predict::predict(&model, table.rows())?)
}

/// Score the whole historical table and write it to `backfill_path`.
pub fn backfill(config: &PipelineConfig) -> Result<BackfillTable> {
    let model = load_model(config)?;
    let table = FeatureTable::load(&config.features_path)?;
    let scored = hobart_predict::backfill(&model, &table)?;
    scored.write_parquet(&config.backfill_path)?;
    info!(rows = scored.len(), path = %config.backfill_path.display(), "backfill written");
    Ok(scored)
}

/// Compute monthly drift metrics over the backfill into `metrics_db`.
pub fn monitor(config: &PipelineConfig) -> Result<Vec<MonthlyMetrics>> {
    let table = BackfillTable::read_parquet(&config.backfill_path)?;
    let mut sink = SqliteSink::open(&config.metrics_db)?;
    Ok(run_monitoring(&table, &config.monitor, &mut sink)?)
}
