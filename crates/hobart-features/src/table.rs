//! Feature rows and their persisted table.
//!
//! Historical tables are stored as Parquet, production tables as JSON
//! records, and either can be exported to CSV for inspection. Dates are
//! written as `YYYY-MM-DD` in JSON and CSV and as a date column in Parquet.

use crate::error::{FeatureError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Column holding the training label.
pub const LABEL_COLUMN: &str = "future_1m_return";

/// Float feature columns, in [`FeatureRow::numeric_values`] order.
pub const FLOAT_COLUMNS: [&str; 8] = [
    "alpha",
    "beta",
    "index_avg",
    "historical_vol",
    "eom_10yr",
    "10yr_avg",
    "spread",
    "vix_avg",
];

/// One ticker's features at one anchor date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Anchor date (first day of the month).
    pub date: NaiveDate,
    /// Ticker symbol.
    pub ticker: String,
    /// CAPM intercept over the trailing year.
    pub alpha: f64,
    /// CAPM slope over the trailing year.
    pub beta: f64,
    /// Months since the first anchor of the history.
    pub month_index: u32,
    /// Mean daily index return over the trailing month.
    pub index_avg: f64,
    /// Sample std-dev of daily returns over the trailing month.
    pub historical_vol: f64,
    /// Last 10-year yield of the trailing month.
    pub eom_10yr: f64,
    /// Mean 10-year yield of the trailing month.
    #[serde(rename = "10yr_avg")]
    pub avg_10yr: f64,
    /// 10-year minus 2-year yield at the end of the trailing month.
    pub spread: f64,
    /// Mean VIX level of the trailing month.
    pub vix_avg: f64,
    /// Static sector label.
    pub sector: String,
    /// Realized return over the following month; historical rows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_1m_return: Option<f64>,
}

impl FeatureRow {
    /// Numeric features in storage order.
    pub const fn numeric_values(&self) -> [f64; 8] {
        [
            self.alpha,
            self.beta,
            self.index_avg,
            self.historical_vol,
            self.eom_10yr,
            self.avg_10yr,
            self.spread,
            self.vix_avg,
        ]
    }

    /// Whether every numeric field is finite.
    pub fn is_complete(&self) -> bool {
        self.numeric_values().iter().all(|v| v.is_finite())
            && self.future_1m_return.is_none_or(f64::is_finite)
    }
}

/// On-disk table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableFormat {
    /// Apache Parquet.
    Parquet,
    /// JSON array of records.
    Json,
    /// Comma-separated values.
    Csv,
}

impl TableFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => Ok(Self::Parquet),
            Some("json") => Ok(Self::Json),
            Some("csv") => Ok(Self::Csv),
            other => Err(FeatureError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// File extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Parquet => "parquet",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Feature rows unique by (date, ticker), sorted by (date, ticker).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Build a table, sorting rows and keeping the first of any duplicate key.
    pub fn new(mut rows: Vec<FeatureRow>) -> Self {
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        rows.dedup_by(|later, earlier| later.date == earlier.date && later.ticker == earlier.ticker);
        Self { rows }
    }

    /// Rows in (date, ticker) order.
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Take ownership of the rows.
    pub fn into_rows(self) -> Vec<FeatureRow> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct anchor dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<_> = self.rows.iter().map(|r| r.date).collect();
        dates.dedup();
        dates
    }

    /// Rows of one anchor date.
    pub fn rows_on(&self, date: NaiveDate) -> &[FeatureRow] {
        let lo = self.rows.partition_point(|r| r.date < date);
        let hi = self.rows.partition_point(|r| r.date <= date);
        &self.rows[lo..hi]
    }

    /// Whether every row carries a label.
    pub fn has_labels(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|r| r.future_1m_return.is_some())
    }

    /// Write in the format implied by the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match TableFormat::from_path(path)? {
            TableFormat::Parquet => self.write_parquet(path),
            TableFormat::Json => self.write_json(path),
            TableFormat::Csv => self.write_csv(path),
        }
    }

    /// Read in the format implied by the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match TableFormat::from_path(path)? {
            TableFormat::Parquet => Self::read_parquet(path),
            TableFormat::Json => Self::read_json(path),
            TableFormat::Csv => Self::read_csv(path),
        }
    }

    /// Convert to a polars frame. The label column is present when any row
    /// has a label, with nulls for the rows that have none.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();
        let mut columns: Vec<Column> = vec![
            Series::new("date".into(), dates).into(),
            Series::new(
                "ticker".into(),
                self.rows.iter().map(|r| r.ticker.as_str()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "month_index".into(),
                self.rows.iter().map(|r| i64::from(r.month_index)).collect::<Vec<_>>(),
            )
            .into(),
        ];
        for (i, name) in FLOAT_COLUMNS.iter().enumerate() {
            let values: Vec<f64> = self.rows.iter().map(|r| r.numeric_values()[i]).collect();
            columns.push(Series::new((*name).into(), values).into());
        }
        columns.push(
            Series::new(
                "sector".into(),
                self.rows.iter().map(|r| r.sector.as_str()).collect::<Vec<_>>(),
            )
            .into(),
        );
        if self.rows.iter().any(|r| r.future_1m_return.is_some()) {
            let labels: Vec<Option<f64>> = self.rows.iter().map(|r| r.future_1m_return).collect();
            columns.push(Series::new(LABEL_COLUMN.into(), labels).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Build from a polars frame with the columns written by
    /// [`to_dataframe`](Self::to_dataframe). Extra columns are ignored.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let dates = column(df, "date")?.cast(&DataType::Date)?;
        let dates: Vec<Option<NaiveDate>> = dates.date()?.as_date_iter().collect();
        let tickers = column(df, "ticker")?;
        let tickers: Vec<Option<&str>> = tickers.str()?.into_iter().collect();
        let sectors = column(df, "sector")?;
        let sectors: Vec<Option<&str>> = sectors.str()?.into_iter().collect();
        let month_index = column(df, "month_index")?.cast(&DataType::Int64)?;
        let month_index: Vec<Option<i64>> = month_index.i64()?.into_iter().collect();

        let mut floats = Vec::with_capacity(FLOAT_COLUMNS.len());
        for name in FLOAT_COLUMNS {
            let series = column(df, name)?.cast(&DataType::Float64)?;
            floats.push(series.f64()?.into_iter().collect::<Vec<Option<f64>>>());
        }
        let labels: Option<Vec<Option<f64>>> = match df.column(LABEL_COLUMN) {
            Ok(col) => {
                let series = col.as_materialized_series().cast(&DataType::Float64)?;
                Some(series.f64()?.into_iter().collect())
            }
            Err(_) => None,
        };

        let invalid = |column: &str, row: usize| FeatureError::InvalidValue {
            column: column.to_string(),
            row,
        };
        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let mut numeric = [0.0; 8];
            for (j, name) in FLOAT_COLUMNS.iter().enumerate() {
                numeric[j] = floats[j][i].ok_or_else(|| invalid(name, i))?;
            }
            let date = dates[i].ok_or_else(|| invalid("date", i))?;
            let month_index = month_index[i]
                .and_then(|m| u32::try_from(m).ok())
                .ok_or_else(|| invalid("month_index", i))?;
            rows.push(FeatureRow {
                date,
                ticker: tickers[i].ok_or_else(|| invalid("ticker", i))?.to_string(),
                alpha: numeric[0],
                beta: numeric[1],
                month_index,
                index_avg: numeric[2],
                historical_vol: numeric[3],
                eom_10yr: numeric[4],
                avg_10yr: numeric[5],
                spread: numeric[6],
                vix_avg: numeric[7],
                sector: sectors[i].ok_or_else(|| invalid("sector", i))?.to_string(),
                future_1m_return: labels.as_ref().and_then(|l| l[i]),
            });
        }
        Ok(Self::new(rows))
    }

    /// Write as Parquet.
    pub fn write_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let file = create(path.as_ref())?;
        ParquetWriter::new(file).finish(&mut df)?;
        Ok(())
    }

    /// Read a Parquet table.
    pub fn read_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let df = ParquetReader::new(File::open(path)?).finish()?;
        Self::from_dataframe(&df)
    }

    /// Write as a JSON array of records.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(create(path.as_ref())?);
        serde_json::to_writer(&mut writer, &self.rows)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a JSON array of records.
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let rows: Vec<FeatureRow> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Ok(Self::new(rows))
    }

    /// Serialize as a JSON string of records.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.rows)?)
    }

    /// Write as CSV. The label column is always present and left empty for
    /// unlabelled rows.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(create(path.as_ref())?);
        let mut header = vec!["date", "ticker", "month_index"];
        header.extend(FLOAT_COLUMNS);
        header.extend(["sector", LABEL_COLUMN]);
        wtr.write_record(&header)?;
        for row in &self.rows {
            let mut record = vec![
                row.date.to_string(),
                row.ticker.clone(),
                row.month_index.to_string(),
            ];
            record.extend(row.numeric_values().iter().map(f64::to_string));
            record.push(row.sector.clone());
            record.push(row.future_1m_return.map(|v| v.to_string()).unwrap_or_default());
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read a CSV export.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(File::open(path)?);
        let headers = rdr.headers()?.clone();
        let idx = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| FeatureError::SchemaMismatch(name.to_string()))
        };
        let date_idx = idx("date")?;
        let ticker_idx = idx("ticker")?;
        let month_idx = idx("month_index")?;
        let sector_idx = idx("sector")?;
        let float_idx = FLOAT_COLUMNS.map(idx);
        let label_idx = idx(LABEL_COLUMN).ok();

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let get = |pos: usize, name: &str| {
                record.get(pos).ok_or_else(|| FeatureError::InvalidValue {
                    column: name.to_string(),
                    row: i,
                })
            };
            let number = |pos: &std::result::Result<usize, FeatureError>, name: &str| -> Result<f64> {
                let pos = *pos.as_ref().map_err(|_| FeatureError::SchemaMismatch(name.to_string()))?;
                get(pos, name)?.parse().map_err(|_| FeatureError::InvalidValue {
                    column: name.to_string(),
                    row: i,
                })
            };
            let mut numeric = [0.0; 8];
            for (j, name) in FLOAT_COLUMNS.iter().enumerate() {
                numeric[j] = number(&float_idx[j], name)?;
            }
            let label = match label_idx {
                Some(pos) => match get(pos, LABEL_COLUMN)? {
                    "" => None,
                    raw => Some(raw.parse().map_err(|_| FeatureError::InvalidValue {
                        column: LABEL_COLUMN.to_string(),
                        row: i,
                    })?),
                },
                None => None,
            };
            rows.push(FeatureRow {
                date: hobart_data::files::parse_date(get(date_idx, "date")?)?,
                ticker: get(ticker_idx, "ticker")?.to_string(),
                alpha: numeric[0],
                beta: numeric[1],
                month_index: get(month_idx, "month_index")?.parse().map_err(|_| {
                    FeatureError::InvalidValue {
                        column: "month_index".to_string(),
                        row: i,
                    }
                })?,
                index_avg: numeric[2],
                historical_vol: numeric[3],
                eom_10yr: numeric[4],
                avg_10yr: numeric[5],
                spread: numeric[6],
                vix_avg: numeric[7],
                sector: get(sector_idx, "sector")?.to_string(),
                future_1m_return: label,
            });
        }
        Ok(Self::new(rows))
    }
}

impl FromIterator<FeatureRow> for FeatureTable {
    fn from_iter<I: IntoIterator<Item = FeatureRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(Column::as_materialized_series)
        .map_err(|_| FeatureError::SchemaMismatch(name.to_string()))
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(date: NaiveDate, ticker: &str, label: Option<f64>) -> FeatureRow {
        FeatureRow {
            date,
            ticker: ticker.to_string(),
            alpha: 0.0004,
            beta: 1.2,
            month_index: 3,
            index_avg: 0.001,
            historical_vol: 0.015,
            eom_10yr: 4.2,
            avg_10yr: 4.1,
            spread: -0.3,
            vix_avg: 14.5,
            sector: "Technology".to_string(),
            future_1m_return: label,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_table_sorted_and_unique() {
        let table = FeatureTable::new(vec![
            row(d(2024, 2, 1), "MSFT", None),
            row(d(2024, 1, 1), "MSFT", None),
            row(d(2024, 1, 1), "AAPL", None),
            row(d(2024, 1, 1), "AAPL", Some(1.0)),
        ]);
        let keys: Vec<_> = table.rows().iter().map(|r| (r.date, r.ticker.as_str())).collect();
        assert_eq!(
            keys,
            vec![(d(2024, 1, 1), "AAPL"), (d(2024, 1, 1), "MSFT"), (d(2024, 2, 1), "MSFT")]
        );
        assert_eq!(table.rows_on(d(2024, 1, 1)).len(), 2);
        assert_eq!(table.dates(), vec![d(2024, 1, 1), d(2024, 2, 1)]);
    }

    #[test]
    fn test_json_record_layout() {
        let json = serde_json::to_value(row(d(2024, 3, 1), "AAPL", None)).unwrap();
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["10yr_avg"], 4.1);
        assert!(json.get("future_1m_return").is_none());
    }

    #[rstest]
    #[case("parquet", Some(0.02))]
    #[case("parquet", None)]
    #[case("json", Some(0.02))]
    #[case("json", None)]
    #[case("csv", Some(-0.01))]
    fn test_save_load_preserves_rows(#[case] ext: &str, #[case] label: Option<f64>) {
        let table = FeatureTable::new(vec![
            row(d(2024, 1, 1), "AAPL", label),
            row(d(2024, 1, 1), "MSFT", label),
            row(d(2024, 2, 1), "AAPL", label),
        ]);
        let path = std::env::temp_dir().join(format!(
            "hobart_table_{}_{}.{ext}",
            ext,
            label.is_some()
        ));

        table.save(&path).unwrap();
        let loaded = FeatureTable::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, table);
    }

    #[test]
    fn test_partial_labels_survive_dataframe() {
        let table = FeatureTable::new(vec![
            row(d(2024, 1, 1), "AAPL", Some(0.03)),
            row(d(2024, 1, 1), "MSFT", None),
            row(d(9999, 12, 1), "AAPL", None),
        ]);

        let df = table.to_dataframe().unwrap();
        assert_eq!(df.column(LABEL_COLUMN).unwrap().null_count(), 2);
        assert_eq!(FeatureTable::from_dataframe(&df).unwrap(), table);
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            TableFormat::from_path(Path::new("features.xlsx")),
            Err(FeatureError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_incomplete_rows_detected() {
        let mut bad = row(d(2024, 1, 1), "AAPL", None);
        assert!(bad.is_complete());
        bad.beta = f64::NAN;
        assert!(!bad.is_complete());
    }
}
