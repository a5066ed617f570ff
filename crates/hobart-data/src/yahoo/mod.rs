//! Yahoo Finance data providers.

pub mod profile;
pub mod quotes;

pub use profile::{UNKNOWN_SECTOR, YahooProfileProvider};
pub use quotes::YahooQuoteProvider;
