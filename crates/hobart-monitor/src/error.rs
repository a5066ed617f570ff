//! Error types for drift monitoring.

use thiserror::Error;

/// Result type for monitoring operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while computing or storing drift metrics.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Backfill table could not be read
    #[error("Predict error: {0}")]
    Predict(#[from] hobart_predict::PredictError),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Monitoring window is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
