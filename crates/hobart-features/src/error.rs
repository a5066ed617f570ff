//! Error types for feature computation and storage.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors that can occur while building or persisting feature tables.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Raw data could not be loaded
    #[error("Data error: {0}")]
    Data(#[from] hobart_data::DataError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Regression grid does not match its dimensions
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored table lacks a column
    #[error("Schema mismatch: missing column '{0}'")]
    SchemaMismatch(String),

    /// Stored table holds a value that a feature row cannot carry
    #[error("Invalid value in column '{column}' at row {row}")]
    InvalidValue {
        /// Column name
        column: String,
        /// Zero-based row position
        row: usize,
    },

    /// Unsupported file extension
    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),
}
