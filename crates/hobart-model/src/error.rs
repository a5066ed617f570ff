//! Error types for preprocessing, training and model bookkeeping.

use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while preparing data or fitting models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Feature table could not be read
    #[error("Feature error: {0}")]
    Feature(#[from] hobart_features::FeatureError),

    /// Tracking or registry failure
    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hyperparameter outside its valid range
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParams {
        /// Parameter name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Matrix dimensions disagree
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Expected size
        expected: usize,
        /// Actual size
        found: usize,
    },

    /// A split or training set has no rows
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// A training row carries no label
    #[error("Row for {ticker} on {date} has no label")]
    MissingLabel {
        /// Ticker symbol
        ticker: String,
        /// Anchor date
        date: chrono::NaiveDate,
    },

    /// A stored model is structurally invalid
    #[error("Corrupt model: {0}")]
    CorruptModel(String),

    /// A run lacks something a later stage needs
    #[error("Run {run_id} has no {what}")]
    IncompleteRun {
        /// Run identifier
        run_id: String,
        /// Missing item
        what: &'static str,
    },
}

/// Errors raised by the experiment tracker and model registry.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Unknown run
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Unknown registered model or version
    #[error("Model version not found: {name} v{version}")]
    VersionNotFound {
        /// Registered model name
        name: String,
        /// Version number
        version: u32,
    },

    /// Run is already finished
    #[error("Run {0} is no longer active")]
    RunClosed(String),

    /// Artifact name escapes the run directory
    #[error("Invalid artifact name: {0}")]
    InvalidArtifact(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
