//! Adjusted close prices from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::series::{PriceObservation, PriceSeries};
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;
use yahoo_finance_api as yahoo;

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider with default rate limiting (1 req/sec).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a provider with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch daily adjusted closes for `symbol` in `[start, end)`.
    ///
    /// Rows are labelled `label`, which lets benchmarks such as `^GSPC` be
    /// stored under a synthetic ticker like `SPX`.
    pub async fn fetch_prices(
        &self,
        symbol: &str,
        label: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = time::OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| DataError::TimeConversion(e.to_string()))?;
        let end_time = time::OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| DataError::TimeConversion(e.to_string()))?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;
        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }

        let observations = quotes
            .iter()
            .map(|q| {
                let date = timestamp_to_date(q.timestamp)?;
                let price = q.adjclose.is_finite().then_some(q.adjclose);
                Ok(PriceObservation::new(date, label, price))
            })
            .collect::<Result<Vec<_>>>()?;

        sleep(self.rate_limit_delay).await;

        Ok(PriceSeries::new(observations))
    }

    /// Fetch several tickers sequentially, skipping the ones that fail.
    pub async fn fetch_prices_batch(
        &self,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        let mut combined = PriceSeries::default();

        for symbol in symbols {
            match self.fetch_prices(symbol, symbol, start, end).await {
                Ok(series) => combined.extend(series),
                Err(e) => {
                    warn!(%symbol, error = %e, "failed to fetch prices");
                    continue;
                }
            }
        }

        if combined.is_empty() {
            return Err(DataError::MissingData {
                symbol: "batch".to_string(),
                reason: "No data fetched for any symbol".to_string(),
            });
        }

        Ok(combined)
    }
}

fn timestamp_to_date(timestamp: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataError::TimeConversion(format!("timestamp {timestamp} out of range")))
}
