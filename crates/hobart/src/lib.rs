#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod stages;

// Re-export the stage crates
pub use hobart_data as data;
pub use hobart_features as features;
pub use hobart_model as model;
pub use hobart_monitor as monitor;
pub use hobart_predict as predict;

pub use config::{DownloadConfig, PipelineConfig};
pub use error::{PipelineError, Result};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
