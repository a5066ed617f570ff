//! Company profile (sector) lookups from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::series::SectorMap;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Sector recorded when a profile carries none.
pub const UNKNOWN_SECTOR: &str = "N/A";

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Yahoo Finance company profile provider.
#[derive(Debug)]
pub struct YahooProfileProvider {
    client: reqwest::Client,
    rate_limit_delay: Duration,
}

impl YahooProfileProvider {
    /// Create a provider with default rate limiting (1 req/sec).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a provider with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
                .build()?,
            rate_limit_delay,
        })
    }

    /// Fetch the sector of a single ticker.
    pub async fn fetch_sector(&self, symbol: &str) -> Result<String> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let response = self
            .client
            .get(format!("{QUOTE_SUMMARY_URL}/{symbol}"))
            .query(&[("modules", "assetProfile")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "profile request for {symbol} returned {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;

        sleep(self.rate_limit_delay).await;

        Ok(sector_from_summary(&body).unwrap_or_else(|| UNKNOWN_SECTOR.to_string()))
    }

    /// Fetch sectors for many tickers. Failed lookups are recorded as
    /// [`UNKNOWN_SECTOR`].
    pub async fn fetch_sectors(&self, symbols: &[String]) -> SectorMap {
        let mut sectors = SectorMap::new();
        for symbol in symbols {
            let sector = match self.fetch_sector(symbol).await {
                Ok(sector) => sector,
                Err(e) => {
                    warn!(%symbol, error = %e, "failed to fetch profile");
                    UNKNOWN_SECTOR.to_string()
                }
            };
            debug!(%symbol, %sector, "resolved sector");
            sectors.insert(symbol.as_str(), sector);
        }
        sectors
    }
}

/// Pull `assetProfile.sector` out of a quoteSummary payload.
pub fn sector_from_summary(body: &Value) -> Option<String> {
    body.pointer("/quoteSummary/result/0/assetProfile/sector")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sector_from_summary() {
        let body = json!({
            "quoteSummary": {
                "result": [{ "assetProfile": { "sector": "Technology", "industry": "Consumer Electronics" } }],
                "error": null
            }
        });
        assert_eq!(sector_from_summary(&body).as_deref(), Some("Technology"));
    }

    #[test]
    fn test_sector_missing_from_summary() {
        let body = json!({ "quoteSummary": { "result": [{ "assetProfile": {} }] } });
        assert_eq!(sector_from_summary(&body), None);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_sector() {
        let provider = YahooProfileProvider::new().unwrap();
        let sector = provider.fetch_sector("AAPL").await.unwrap();
        assert!(!sector.is_empty());
    }
}
