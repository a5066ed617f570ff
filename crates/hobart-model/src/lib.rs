#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, deny(unsafe_code))]

pub mod booster;
pub mod dataset;
pub mod error;
pub mod hpo;
pub mod metrics;
pub mod params;
pub mod registry;
pub mod tracking;
pub mod training;
pub mod vectorizer;

pub use booster::GradientBoostedTrees;
pub use dataset::{DateSplit, Dataset, PreparedData, SplitConfig, prepare, split_by_date};
pub use error::{ModelError, Result, TrackingError};
pub use hpo::{Optimizer, RandomSearch, Trial};
pub use metrics::rmse;
pub use params::{BoosterParams, Distribution, SearchSpace};
pub use registry::{FileRegistry, ModelRegistry, ModelVersion, Stage};
pub use tracking::{ExperimentTracker, FileTracker, RunId, RunRecord, RunStatus};
pub use training::{
    BASELINE_EXPERIMENT, MODEL_ARTIFACT_DIR, RegisterConfig, TuneConfig, register, train, tune,
    tune_random,
};
pub use vectorizer::FeatureVectorizer;

/// File name of a serialized booster inside a model directory.
pub const MODEL_FILE: &str = "model.json";

/// File name of a serialized vectorizer inside a model directory.
pub const VECTORIZER_FILE: &str = "dv.json";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
