//! Error type spanning every pipeline stage.

use thiserror::Error;

/// Result type for pipeline stages.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while running a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raw data error
    #[error("Data error: {0}")]
    Data(#[from] hobart_data::DataError),

    /// Feature engine or table error
    #[error("Feature error: {0}")]
    Feature(#[from] hobart_features::FeatureError),

    /// Preprocessing, training or registry error
    #[error("Model error: {0}")]
    Model(#[from] hobart_model::ModelError),

    /// Model loading or scoring error
    #[error("Predict error: {0}")]
    Predict(#[from] hobart_predict::PredictError),

    /// Monitoring error
    #[error("Monitor error: {0}")]
    Monitor(#[from] hobart_monitor::MonitorError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
