#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod capm;
pub mod engine;
pub mod error;
pub mod join;
pub mod label;
pub mod returns;
pub mod table;
pub mod window;

pub use engine::{EngineConfig, FeatureEngine, MarketData};
pub use error::{FeatureError, Result};
pub use table::{FLOAT_COLUMNS, FeatureRow, FeatureTable, LABEL_COLUMN, TableFormat};
pub use window::{Window, WindowKind};
