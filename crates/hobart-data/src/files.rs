//! CSV storage for raw series.
//!
//! Every reader checks the header row before touching data: a missing column
//! is a [`DataError::SchemaMismatch`], an unparseable cell a
//! [`DataError::Parse`]. Empty cells (and `.`/`NaN` markers) are read as
//! absent values.

use crate::error::{DataError, Result};
use crate::series::{
    Maturity, PriceObservation, PriceSeries, SectorMap, YieldObservation, YieldSeries,
};
use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Synthetic ticker of the S&P 500 index series.
pub const INDEX_TICKER: &str = "SPX";

/// Synthetic ticker of the VIX series.
pub const VIX_TICKER: &str = "VIX";

/// File names of the raw inputs inside one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLayout {
    /// Directory holding the raw CSV files.
    pub dir: PathBuf,
}

impl RawLayout {
    /// Layout rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `stock_price.csv`
    pub fn stock_prices(&self) -> PathBuf {
        self.dir.join("stock_price.csv")
    }

    /// `index_price.csv`
    pub fn index_prices(&self) -> PathBuf {
        self.dir.join("index_price.csv")
    }

    /// `vix_price.csv`
    pub fn vix_prices(&self) -> PathBuf {
        self.dir.join("vix_price.csv")
    }

    /// Yield file of one maturity.
    pub fn yields(&self, maturity: Maturity) -> PathBuf {
        match maturity {
            Maturity::TenYear => self.dir.join("treasury_yield_10yr.csv"),
            Maturity::TwoYear => self.dir.join("treasury_yield_2yr.csv"),
        }
    }

    /// `company_sector.csv`
    pub fn sectors(&self) -> PathBuf {
        self.dir.join("company_sector.csv")
    }
}

/// Parse a `YYYY-MM-DD` date, tolerating a trailing time component.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("invalid date '{trimmed}': {e}")))
}

fn parse_value(raw: &str, source: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|e| DataError::Parse(format!("invalid number '{trimmed}' in {source}: {e}")))
}

fn column(headers: &StringRecord, source: &str, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| DataError::SchemaMismatch {
            source_name: source.to_string(),
            column: name.to_string(),
        })
}

fn field<'r>(record: &'r StringRecord, idx: usize, source: &str) -> Result<&'r str> {
    record.get(idx).ok_or_else(|| {
        DataError::Parse(format!(
            "short row in {source} at line {}",
            record.position().map_or(0, |p| p.line())
        ))
    })
}

fn source_name(path: &Path) -> String {
    path.display().to_string()
}

/// Read stock prices with columns `date,ticker,price`.
pub fn read_prices(path: impl AsRef<Path>) -> Result<PriceSeries> {
    let path = path.as_ref();
    prices_from_reader(File::open(path)?, &source_name(path))
}

/// Read stock prices from any reader.
pub fn prices_from_reader<R: Read>(reader: R, source: &str) -> Result<PriceSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let date_idx = column(&headers, source, "date")?;
    let ticker_idx = column(&headers, source, "ticker")?;
    let price_idx = column(&headers, source, "price")?;

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record?;
        observations.push(PriceObservation {
            date: parse_date(field(&record, date_idx, source)?)?,
            ticker: field(&record, ticker_idx, source)?.trim().to_string(),
            price: parse_value(field(&record, price_idx, source)?, source)?,
        });
    }
    Ok(PriceSeries::new(observations))
}

/// Read a benchmark (index or VIX) with columns `date,price`.
///
/// A `ticker` column is accepted but ignored; every row is labelled `label`.
pub fn read_benchmark(path: impl AsRef<Path>, label: &str) -> Result<PriceSeries> {
    let path = path.as_ref();
    benchmark_from_reader(File::open(path)?, &source_name(path), label)
}

/// Read a benchmark from any reader.
pub fn benchmark_from_reader<R: Read>(reader: R, source: &str, label: &str) -> Result<PriceSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let date_idx = column(&headers, source, "date")?;
    let price_idx = column(&headers, source, "price")?;

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record?;
        observations.push(PriceObservation::new(
            parse_date(field(&record, date_idx, source)?)?,
            label,
            parse_value(field(&record, price_idx, source)?, source)?,
        ));
    }
    Ok(PriceSeries::new(observations))
}

/// Read treasury yields with columns `date,<series id>` and fill gaps.
pub fn read_yields(path: impl AsRef<Path>, maturity: Maturity) -> Result<YieldSeries> {
    let path = path.as_ref();
    yields_from_reader(File::open(path)?, &source_name(path), maturity)
}

/// Read treasury yields from any reader and fill gaps.
pub fn yields_from_reader<R: Read>(
    reader: R,
    source: &str,
    maturity: Maturity,
) -> Result<YieldSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let date_idx = column(&headers, source, "date")?;
    let value_idx = column(&headers, source, maturity.series_id())?;

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record?;
        observations.push(YieldObservation {
            date: parse_date(field(&record, date_idx, source)?)?,
            value: parse_value(field(&record, value_idx, source)?, source)?,
        });
    }
    Ok(YieldSeries::new(maturity, observations).filled())
}

/// Read the sector map with columns `ticker,sector`.
pub fn read_sectors(path: impl AsRef<Path>) -> Result<SectorMap> {
    let path = path.as_ref();
    sectors_from_reader(File::open(path)?, &source_name(path))
}

/// Read the sector map from any reader.
pub fn sectors_from_reader<R: Read>(reader: R, source: &str) -> Result<SectorMap> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let ticker_idx = column(&headers, source, "ticker")?;
    let sector_idx = column(&headers, source, "sector")?;

    let mut sectors = SectorMap::new();
    for record in rdr.records() {
        let record = record?;
        sectors.insert(
            field(&record, ticker_idx, source)?.trim(),
            field(&record, sector_idx, source)?.trim(),
        );
    }
    Ok(sectors)
}

/// Read the download universe from a file with a `Symbol` column.
pub fn read_tickers(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let source = source_name(path);
    let mut rdr = csv::Reader::from_reader(File::open(path)?);
    let headers = rdr.headers()?.clone();
    let symbol_idx = column(&headers, &source, "Symbol")?;

    let mut tickers = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let symbol = field(&record, symbol_idx, &source)?.trim();
        if !symbol.is_empty() {
            tickers.push(symbol.to_string());
        }
    }
    Ok(tickers)
}

#[derive(Serialize)]
struct PriceRecord<'a> {
    date: NaiveDate,
    ticker: &'a str,
    price: Option<f64>,
}

/// Write prices as `date,ticker,price`.
pub fn write_prices(path: impl AsRef<Path>, series: &PriceSeries) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(create(path.as_ref())?);
    for obs in series.observations() {
        wtr.serialize(PriceRecord {
            date: obs.date,
            ticker: &obs.ticker,
            price: obs.price,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write yields as `date,<series id>`.
pub fn write_yields(path: impl AsRef<Path>, series: &YieldSeries) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(create(path.as_ref())?);
    wtr.write_record(["date", series.maturity().series_id()])?;
    for obs in series.observations() {
        let value = obs.value.map(|v| v.to_string()).unwrap_or_default();
        wtr.write_record([obs.date.to_string(), value])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the sector map as `ticker,sector`.
pub fn write_sectors(path: impl AsRef<Path>, sectors: &SectorMap) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(create(path.as_ref())?);
    wtr.write_record(["ticker", "sector"])?;
    for (ticker, sector) in sectors.iter() {
        wtr.write_record([ticker, sector])?;
    }
    wtr.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<impl Write> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}
