//! Destinations for monthly metrics.

use crate::error::Result;
use crate::metrics::MonthlyMetrics;
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use std::path::Path;

/// Table holding one row per monitored month.
pub const METRICS_TABLE: &str = "drift_metrics";

/// Somewhere monthly metrics are recorded.
pub trait MetricsSink {
    /// Reset storage before a monitoring run.
    fn prepare(&mut self) -> Result<()>;

    /// Record one month.
    fn write(&mut self, metrics: &MonthlyMetrics) -> Result<()>;
}

/// SQLite-backed metrics sink.
#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Open or create a database file, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { conn: Connection::open(path)? })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    /// Every stored month, oldest first.
    pub fn read_all(&self) -> Result<Vec<MonthlyMetrics>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT timestamp, prediction_drift, num_drifted_columns, share_missing_values,
                    median_return, alpha_out_of_range_share
             FROM {METRICS_TABLE} ORDER BY timestamp"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(MonthlyMetrics {
                timestamp: NaiveDate::parse_from_str(&row.get::<_, String>(0)?, "%Y-%m-%d")
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                prediction_drift: row.get(1)?,
                num_drifted_columns: row.get(2)?,
                share_missing_values: row.get(3)?,
                median_return: row.get(4)?,
                alpha_out_of_range_share: row.get(5)?,
            })
        })?;

        let mut metrics = Vec::new();
        for row in rows {
            metrics.push(row?);
        }
        Ok(metrics)
    }
}

impl MetricsSink for SqliteSink {
    fn prepare(&mut self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {METRICS_TABLE};
             CREATE TABLE {METRICS_TABLE} (
                timestamp TEXT NOT NULL,
                prediction_drift REAL,
                num_drifted_columns INTEGER NOT NULL,
                share_missing_values REAL NOT NULL,
                median_return REAL,
                alpha_out_of_range_share REAL NOT NULL
             );"
        ))?;
        Ok(())
    }

    fn write(&mut self, metrics: &MonthlyMetrics) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {METRICS_TABLE} (timestamp, prediction_drift, num_drifted_columns,
                    share_missing_values, median_return, alpha_out_of_range_share)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                metrics.timestamp.to_string(),
                metrics.prediction_drift,
                metrics.num_drifted_columns,
                metrics.share_missing_values,
                metrics.median_return,
                metrics.alpha_out_of_range_share,
            ],
        )?;
        Ok(())
    }
}

impl MetricsSink for Vec<MonthlyMetrics> {
    fn prepare(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn write(&mut self, metrics: &MonthlyMetrics) -> Result<()> {
        self.push(metrics.clone());
        Ok(())
    }
}
