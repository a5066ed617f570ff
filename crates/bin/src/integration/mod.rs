//! Integration module for the asynchronous parts of the pipeline.
//!
//! Only the raw-data download talks to the network; every other stage is
//! synchronous and lives in the `hobart` crate.

pub(crate) mod download;
