//! Scoring feature rows.

use crate::error::Result;
use crate::source::LoadedModel;
use chrono::NaiveDate;
use hobart_features::FeatureRow;
use hobart_model::FeatureVectorizer;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Predicted one-month return of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Ticker symbol.
    pub ticker: String,
    /// Anchor date of the features.
    pub date: NaiveDate,
    /// Predicted return over the month following `date`.
    pub predicted_1m_return: f64,
    /// Version of the model that produced the value.
    pub model_version: String,
}

/// Encode rows with the model's vectorizer.
pub fn prepare_features(rows: &[FeatureRow], vectorizer: &FeatureVectorizer) -> Array2<f64> {
    vectorizer.transform(rows)
}

/// Score every row.
pub fn predict(model: &LoadedModel, rows: &[FeatureRow]) -> Result<Vec<Prediction>> {
    let x = prepare_features(rows, &model.vectorizer);
    let values = model.booster.predict(x.view())?;
    info!(rows = rows.len(), version = %model.version, "scored rows");
    Ok(rows
        .iter()
        .zip(values)
        .map(|(row, value)| Prediction {
            ticker: row.ticker.clone(),
            date: row.date,
            predicted_1m_return: value,
            model_version: model.version.clone(),
        })
        .collect())
}
