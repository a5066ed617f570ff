//! Treasury constant-maturity yields from FRED.

use crate::error::{DataError, Result};
use crate::files::parse_date;
use crate::series::{Maturity, YieldObservation, YieldSeries};
use chrono::NaiveDate;
use tracing::debug;

const FRED_GRAPH_URL: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";

/// FRED graph CSV provider. Needs no API key.
#[derive(Debug, Clone)]
pub struct FredProvider {
    client: reqwest::Client,
    base_url: String,
}

impl FredProvider {
    /// Create a provider pointing at the public FRED endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(FRED_GRAPH_URL)
    }

    /// Create a provider pointing at a custom endpoint.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.into(),
        })
    }

    /// Fetch daily yields for `maturity` in `[start, end]`.
    ///
    /// Missing values are kept absent; callers fill gaps on load.
    pub async fn fetch_yields(
        &self,
        maturity: Maturity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<YieldSeries> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("id", maturity.series_id().to_string()),
                ("cosd", start.to_string()),
                ("coed", end.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "FRED request for {maturity} returned {}",
                response.status()
            )));
        }
        let body = response.text().await?;
        let series = parse_fred_csv(&body, maturity)?;
        debug!(%maturity, rows = series.len(), "fetched yields");
        Ok(series)
    }
}

/// Parse a FRED graph CSV: a date column (named `observation_date` or
/// `DATE`) followed by the series column.
pub fn parse_fred_csv(body: &str, maturity: Maturity) -> Result<YieldSeries> {
    let source = format!("FRED {maturity}");
    let mut rdr = csv::Reader::from_reader(body.as_bytes());
    let headers = rdr.headers()?.clone();
    let value_idx = headers
        .iter()
        .position(|h| h.trim() == maturity.series_id())
        .ok_or_else(|| DataError::SchemaMismatch {
            source_name: source.clone(),
            column: maturity.series_id().to_string(),
        })?;
    let date_idx = headers
        .iter()
        .position(|h| matches!(h.trim(), "observation_date" | "DATE" | "date"))
        .ok_or_else(|| DataError::SchemaMismatch {
            source_name: source.clone(),
            column: "observation_date".to_string(),
        })?;

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let (Some(raw_date), Some(raw_value)) = (record.get(date_idx), record.get(value_idx))
        else {
            return Err(DataError::Parse(format!("short row in {source}")));
        };
        let value = match raw_value.trim() {
            "" | "." => None,
            v => Some(
                v.parse::<f64>()
                    .map_err(|e| DataError::Parse(format!("invalid yield '{v}': {e}")))?,
            ),
        };
        observations.push(YieldObservation {
            date: parse_date(raw_date)?,
            value,
        });
    }
    Ok(YieldSeries::new(maturity, observations))
}
