#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backfill;
pub mod error;
pub mod loader;
pub mod predict;
pub mod source;

pub use backfill::{BACKFILL_FILE, BackfillTable, backfill};
pub use error::{PredictError, Result};
pub use loader::{LoaderConfig, ModelLoader};
pub use predict::{Prediction, predict, prepare_features};
pub use source::{LoadedModel, LocalSource, ModelSource, RegistrySource, RunArtifactSource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
