//! Scored historical tables for monitoring.
//!
//! A backfill table is a feature table plus two columns,
//! `predicted_1m_return` and `model_version`, stored as Parquet.

use crate::error::{PredictError, Result};
use crate::predict::predict;
use crate::source::LoadedModel;
use hobart_features::{FeatureRow, FeatureTable};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Default file name of a backfill table.
pub const BACKFILL_FILE: &str = "backfill.parquet";

const PREDICTION_COLUMN: &str = "predicted_1m_return";
const VERSION_COLUMN: &str = "model_version";

/// Feature rows with their predictions, in (date, ticker) order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillTable {
    features: FeatureTable,
    predictions: Vec<f64>,
    model_versions: Vec<String>,
}

impl BackfillTable {
    /// Pair a table with predictions aligned to its rows.
    pub fn new(features: FeatureTable, predictions: Vec<f64>, model_versions: Vec<String>) -> Result<Self> {
        if predictions.len() != features.len() || model_versions.len() != features.len() {
            return Err(PredictError::SchemaMismatch(format!(
                "{} rows but {} predictions and {} versions",
                features.len(),
                predictions.len(),
                model_versions.len()
            )));
        }
        Ok(Self {
            features,
            predictions,
            model_versions,
        })
    }

    /// Feature rows.
    pub fn rows(&self) -> &[FeatureRow] {
        self.features.rows()
    }

    /// Predictions aligned with [`rows`](Self::rows).
    pub fn predictions(&self) -> &[f64] {
        &self.predictions
    }

    /// Model versions aligned with [`rows`](Self::rows).
    pub fn model_versions(&self) -> &[String] {
        &self.model_versions
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Rows with their predictions.
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureRow, f64)> + '_ {
        self.rows().iter().zip(self.predictions.iter().copied())
    }

    /// Convert to a polars frame.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut df = self.features.to_dataframe()?;
        df.with_column(Column::new(PREDICTION_COLUMN.into(), self.predictions.clone()))?;
        df.with_column(Column::new(
            VERSION_COLUMN.into(),
            self.model_versions.iter().map(String::as_str).collect::<Vec<_>>(),
        ))?;
        Ok(df)
    }

    /// Build from a frame written by [`to_dataframe`](Self::to_dataframe).
    /// Rows must already be in (date, ticker) order without duplicates.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let features = FeatureTable::from_dataframe(df)?;
        let missing = |name: &str| PredictError::SchemaMismatch(format!("missing column '{name}'"));
        let predictions = df
            .column(PREDICTION_COLUMN)
            .map_err(|_| missing(PREDICTION_COLUMN))?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let predictions = predictions
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| PredictError::SchemaMismatch(format!("null prediction at row {i}")))
            })
            .collect::<Result<Vec<f64>>>()?;
        let versions = df
            .column(VERSION_COLUMN)
            .map_err(|_| missing(VERSION_COLUMN))?
            .as_materialized_series()
            .clone();
        let model_versions = versions
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect();
        Self::new(features, predictions, model_versions)
    }

    /// Write as Parquet, creating parent directories.
    pub fn write_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut df = self.to_dataframe()?;
        ParquetWriter::new(File::create(path)?).finish(&mut df)?;
        Ok(())
    }

    /// Read a Parquet backfill table.
    pub fn read_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let df = ParquetReader::new(File::open(path)?).finish()?;
        Self::from_dataframe(&df)
    }
}

/// Score every row of `table` with `model`.
pub fn backfill(model: &LoadedModel, table: &FeatureTable) -> Result<BackfillTable> {
    let predictions = predict(model, table.rows())?;
    let versions = vec![model.version.clone(); predictions.len()];
    let values = predictions.into_iter().map(|p| p.predicted_1m_return).collect();
    let scored = BackfillTable::new(table.clone(), values, versions)?;
    info!(rows = scored.len(), version = %model.version, "backfill scored");
    Ok(scored)
}
