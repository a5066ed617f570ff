#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod metrics;
pub mod sink;
pub mod stats;

pub use error::{MonitorError, Result};
pub use metrics::{MonitorConfig, MonthlyMetrics, ScoredRow, compute_metrics, run_monitoring};
pub use sink::{METRICS_TABLE, MetricsSink, SqliteSink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
