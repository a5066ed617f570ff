//! Raw-data download.
//!
//! Fetches daily adjusted closes for the ticker universe, the index and VIX,
//! both treasury yields and every ticker's sector, then writes the raw CSV
//! directory read by the feature engine.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use hobart::DownloadConfig;
use hobart::data::calendar::{history_start, market_close_date};
use hobart::data::files::{self, INDEX_TICKER, RawLayout, VIX_TICKER};
use hobart::data::fred::FredProvider;
use hobart::data::yahoo::{YahooProfileProvider, YahooQuoteProvider};
use hobart::data::{DataError, Maturity, PriceSeries};
use indicatif::ProgressBar;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Date bounds of one download, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DownloadRange {
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
}

impl DownloadRange {
    /// `span_years` of history up to the last final New York close at `now`.
    pub(crate) fn at(now: DateTime<Utc>, span_years: u32) -> Self {
        let end = market_close_date(now);
        Self {
            start: history_start(end, span_years),
            end,
        }
    }

    fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Midnight after `end`, since Yahoo's upper bound is exclusive.
    fn end_utc(&self) -> DateTime<Utc> {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(NaiveTime::MIN)
            .and_utc()
    }
}

/// What a download wrote.
#[derive(Debug, Clone)]
pub(crate) struct DownloadSummary {
    pub(crate) range: DownloadRange,
    pub(crate) tickers: usize,
    pub(crate) stock_rows: usize,
    pub(crate) failed: Vec<String>,
}

/// Fetch every symbol with bounded concurrency, skipping failures.
async fn fetch_stock_prices(
    provider: &YahooQuoteProvider,
    symbols: &[String],
    range: DownloadRange,
    concurrency: usize,
    progress: Option<&ProgressBar>,
) -> Result<(PriceSeries, Vec<String>), DataError> {
    let (start, end) = (range.start_utc(), range.end_utc());
    if let Some(pb) = progress {
        pb.set_length(symbols.len() as u64);
        pb.set_message(format!("Fetching {} symbols ({concurrency} concurrent)...", symbols.len()));
    }

    let mut outcomes = stream::iter(symbols)
        .map(|symbol| async move {
            provider
                .fetch_prices(symbol, symbol, start, end)
                .await
                .map_err(|e| (symbol, e))
        })
        .buffer_unordered(concurrency);

    let mut combined = PriceSeries::default();
    let mut failed = Vec::new();
    while let Some(outcome) = outcomes.next().await {
        match outcome {
            Ok(series) => combined.extend(series),
            Err((symbol, e)) => {
                match progress {
                    Some(pb) => pb.suspend(|| warn!(%symbol, error = %e, "failed to fetch prices")),
                    None => warn!(%symbol, error = %e, "failed to fetch prices"),
                }
                failed.push(symbol.clone());
            }
        }
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    if combined.is_empty() {
        return Err(DataError::MissingData {
            symbol: "batch".to_string(),
            reason: "No data fetched for any symbol".to_string(),
        });
    }
    Ok((combined, failed))
}

/// Download every raw input into `layout`.
pub(crate) async fn download(
    config: &DownloadConfig,
    layout: &RawLayout,
    now: DateTime<Utc>,
    progress: Option<&ProgressBar>,
) -> Result<DownloadSummary, DataError> {
    let tickers = files::read_tickers(&config.tickers_path)?;
    let range = DownloadRange::at(now, config.data_span_years);
    info!(tickers = tickers.len(), start = %range.start, end = %range.end, "starting download");

    let delay = Duration::from_millis(config.rate_limit_ms);
    let quotes = YahooQuoteProvider::with_rate_limit(delay)?;
    let (stocks, failed) =
        fetch_stock_prices(&quotes, &tickers, range, config.concurrency, progress).await?;

    let index = quotes
        .fetch_prices(&config.index_symbol, INDEX_TICKER, range.start_utc(), range.end_utc())
        .await?;
    let vix = quotes
        .fetch_prices(&config.vix_symbol, VIX_TICKER, range.start_utc(), range.end_utc())
        .await?;

    let fred = FredProvider::new()?;
    let treasury_10y = fred.fetch_yields(Maturity::TenYear, range.start, range.end).await?;
    let treasury_2y = fred.fetch_yields(Maturity::TwoYear, range.start, range.end).await?;

    let fetched: Vec<String> = stocks.tickers().into_iter().map(str::to_string).collect();
    if let Some(pb) = progress {
        pb.set_message(format!("Resolving sectors of {} tickers...", fetched.len()));
    }
    let sectors = YahooProfileProvider::with_rate_limit(delay)?
        .fetch_sectors(&fetched)
        .await;

    files::write_prices(layout.stock_prices(), &stocks)?;
    files::write_prices(layout.index_prices(), &index)?;
    files::write_prices(layout.vix_prices(), &vix)?;
    files::write_yields(layout.yields(Maturity::TenYear), &treasury_10y)?;
    files::write_yields(layout.yields(Maturity::TwoYear), &treasury_2y)?;
    files::write_sectors(layout.sectors(), &sectors)?;
    info!(dir = %layout.dir.display(), rows = stocks.len(), "raw data written");

    Ok(DownloadSummary {
        range,
        tickers: fetched.len(),
        stock_rows: stocks.len(),
        failed,
    })
}

/// [`download`] with up to `config.attempts` tries, pausing between them.
pub(crate) async fn download_with_retry(
    config: &DownloadConfig,
    layout: &RawLayout,
    progress: Option<&ProgressBar>,
) -> Result<DownloadSummary, DataError> {
    let mut attempt = 1;
    loop {
        match download(config, layout, Utc::now(), progress).await {
            Ok(summary) => return Ok(summary),
            Err(e) if attempt < config.attempts => {
                warn!(attempt, error = %e, "download failed, retrying");
                sleep(Duration::from_secs(config.retry_delay_secs)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
