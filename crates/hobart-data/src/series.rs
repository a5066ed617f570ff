//! Typed market data series.
//!
//! Price series hold one observation per (date, ticker); benchmark series
//! (index, VIX) are price series with a single synthetic ticker. Yield series
//! hold one maturity each and are gap-filled before use.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single daily price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Trading date.
    pub date: NaiveDate,
    /// Ticker symbol.
    pub ticker: String,
    /// Adjusted close, absent when the provider had no value.
    pub price: Option<f64>,
}

impl PriceObservation {
    /// Create a new observation.
    pub fn new(date: NaiveDate, ticker: impl Into<String>, price: Option<f64>) -> Self {
        Self {
            date,
            ticker: ticker.into(),
            price,
        }
    }
}

/// Price observations sorted by (ticker, date), unique per (ticker, date).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    observations: Vec<PriceObservation>,
}

impl PriceSeries {
    /// Build a series, sorting by (ticker, date) and keeping the first
    /// observation of any duplicated (ticker, date) pair.
    pub fn new(mut observations: Vec<PriceObservation>) -> Self {
        observations.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));
        observations.dedup_by(|later, earlier| {
            later.ticker == earlier.ticker && later.date == earlier.date
        });
        Self { observations }
    }

    /// All observations in (ticker, date) order.
    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series holds no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Earliest observation date.
    pub fn min_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|o| o.date).min()
    }

    /// Latest observation date.
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|o| o.date).max()
    }

    /// Distinct tickers, sorted.
    pub fn tickers(&self) -> BTreeSet<&str> {
        self.observations.iter().map(|o| o.ticker.as_str()).collect()
    }

    /// Iterate date-sorted observation runs, one per ticker.
    pub fn by_ticker(&self) -> impl Iterator<Item = (&str, &[PriceObservation])> {
        self.observations
            .chunk_by(|a, b| a.ticker == b.ticker)
            .map(|run| (run[0].ticker.as_str(), run))
    }

    /// Merge another series into this one.
    pub fn extend(&mut self, other: Self) {
        let mut merged = std::mem::take(&mut self.observations);
        merged.extend(other.observations);
        *self = Self::new(merged);
    }
}

impl FromIterator<PriceObservation> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = PriceObservation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Treasury constant-maturity tenor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Maturity {
    /// 10-year constant maturity.
    TenYear,
    /// 2-year constant maturity.
    TwoYear,
}

impl Maturity {
    /// FRED series identifier, also the value column name in storage.
    pub const fn series_id(&self) -> &'static str {
        match self {
            Self::TenYear => "DGS10",
            Self::TwoYear => "DGS2",
        }
    }
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.series_id())
    }
}

/// A single yield observation in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldObservation {
    /// Publication date.
    pub date: NaiveDate,
    /// Yield in percent, absent on holidays.
    pub value: Option<f64>,
}

/// Date-sorted yields for one maturity.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldSeries {
    maturity: Maturity,
    observations: Vec<YieldObservation>,
}

impl YieldSeries {
    /// Build a series sorted by date.
    pub fn new(maturity: Maturity, mut observations: Vec<YieldObservation>) -> Self {
        observations.sort_by_key(|o| o.date);
        observations.dedup_by_key(|o| o.date);
        Self {
            maturity,
            observations,
        }
    }

    /// Tenor of this series.
    pub const fn maturity(&self) -> Maturity {
        self.maturity
    }

    /// All observations in date order.
    pub fn observations(&self) -> &[YieldObservation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series holds no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Forward-fill then back-fill missing values across the published rows.
    ///
    /// After this call every row has a value unless the series had none at all.
    pub fn fill_gaps(&mut self) {
        let mut last = None;
        for obs in &mut self.observations {
            match obs.value {
                Some(v) => last = Some(v),
                None => obs.value = last,
            }
        }
        let mut next = None;
        for obs in self.observations.iter_mut().rev() {
            match obs.value {
                Some(v) => next = Some(v),
                None => obs.value = next,
            }
        }
    }

    /// Consuming variant of [`fill_gaps`](Self::fill_gaps).
    pub fn filled(mut self) -> Self {
        self.fill_gaps();
        self
    }

    /// Whether any row still lacks a value.
    pub fn has_gaps(&self) -> bool {
        self.observations.iter().any(|o| o.value.is_none())
    }
}

/// Static ticker to sector mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectorMap {
    sectors: BTreeMap<String, String>,
}

impl SectorMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the sector of a ticker.
    pub fn insert(&mut self, ticker: impl Into<String>, sector: impl Into<String>) {
        self.sectors.insert(ticker.into(), sector.into());
    }

    /// Sector of a ticker.
    pub fn get(&self, ticker: &str) -> Option<&str> {
        self.sectors.get(ticker).map(String::as_str)
    }

    /// Number of mapped tickers.
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    /// Whether no ticker is mapped.
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Iterate (ticker, sector) pairs sorted by ticker.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sectors.iter().map(|(t, s)| (t.as_str(), s.as_str()))
    }
}

impl<T: Into<String>, S: Into<String>> FromIterator<(T, S)> for SectorMap {
    fn from_iter<I: IntoIterator<Item = (T, S)>>(iter: I) -> Self {
        Self {
            sectors: iter
                .into_iter()
                .map(|(t, s)| (t.into(), s.into()))
                .collect(),
        }
    }
}
