//! Error types for model loading and scoring.

use thiserror::Error;

/// Result type for prediction operations.
pub type Result<T> = std::result::Result<T, PredictError>;

/// Errors that can occur while loading a model or scoring rows.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Model or vectorizer failure
    #[error("Model error: {0}")]
    Model(#[from] hobart_model::ModelError),

    /// Registry or tracker failure
    #[error("Tracking error: {0}")]
    Tracking(#[from] hobart_model::TrackingError),

    /// Feature table failure
    #[error("Feature error: {0}")]
    Feature(#[from] hobart_features::FeatureError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A source has nothing to load
    #[error("Source {source_name} unavailable: {reason}")]
    SourceUnavailable {
        /// Source description
        source_name: String,
        /// Why it could not load
        reason: String,
    },

    /// Every configured source failed
    #[error("No model available; tried: {}", attempts.join("; "))]
    NoModelAvailable {
        /// One `source: error` entry per attempt
        attempts: Vec<String>,
    },

    /// Stored table lacks a column or holds bad values
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
}
