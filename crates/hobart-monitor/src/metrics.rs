//! Monthly drift metrics over a scored backfill table.

use crate::error::{MonitorError, Result};
use crate::sink::MetricsSink;
use crate::stats::{chi_square_categorical, ks_two_sample, median, share_outside};
use chrono::{Months, NaiveDate};
use hobart_features::{FLOAT_COLUMNS, FeatureRow};
use hobart_predict::BackfillTable;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Cells per row: date, ticker, month_index, the float features, sector,
/// label, prediction and model version.
const CELLS_PER_ROW: usize = FLOAT_COLUMNS.len() + 7;

/// Reference window, monitored months and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Exclusive lower bound of the reference window.
    pub reference_start: NaiveDate,
    /// Exclusive upper bound of the reference window and first monitored month.
    pub reference_end: NaiveDate,
    /// Exclusive end of the monitored months.
    pub until: NaiveDate,
    /// p-value below which a column counts as drifted.
    pub drift_threshold: f64,
    /// Closed range of acceptable `alpha` values.
    pub alpha_range: (f64, f64),
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reference_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            reference_end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            until: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap_or_default(),
            drift_threshold: 0.05,
            alpha_range: (-0.0025, 0.0025),
        }
    }
}

impl MonitorConfig {
    /// Reject inverted windows and out-of-range thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.reference_start >= self.reference_end {
            return Err(MonitorError::InvalidConfig(format!(
                "reference window {}..{} is empty",
                self.reference_start, self.reference_end
            )));
        }
        if !(0.0..=1.0).contains(&self.drift_threshold) {
            return Err(MonitorError::InvalidConfig(format!(
                "drift threshold {} outside [0, 1]",
                self.drift_threshold
            )));
        }
        if self.alpha_range.0 > self.alpha_range.1 {
            return Err(MonitorError::InvalidConfig(format!(
                "alpha range {:?} is inverted",
                self.alpha_range
            )));
        }
        Ok(())
    }

    /// Whether `date` lies strictly inside the reference window.
    pub fn in_reference(&self, date: NaiveDate) -> bool {
        self.reference_start < date && date < self.reference_end
    }

    /// Monitored month starts: `reference_end`, then monthly while before `until`.
    pub fn months(&self) -> Vec<NaiveDate> {
        std::iter::successors(Some(self.reference_end), |m| m.checked_add_months(Months::new(1)))
            .take_while(|m| *m < self.until)
            .collect()
    }
}

/// Metrics recorded for one monitored month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMetrics {
    /// Month start.
    pub timestamp: NaiveDate,
    /// KS p-value of predictions against the reference.
    pub prediction_drift: Option<f64>,
    /// Number of columns whose drift p-value is below the threshold.
    pub num_drifted_columns: u32,
    /// Missing cells over all cells of the month.
    pub share_missing_values: f64,
    /// Median realized one-month return, when labels exist.
    pub median_return: Option<f64>,
    /// Share of `alpha` outside the configured range.
    pub alpha_out_of_range_share: f64,
}

/// A feature row joined with its prediction and model version.
#[derive(Debug, Clone, Copy)]
pub struct ScoredRow<'a> {
    /// Features and label.
    pub row: &'a FeatureRow,
    /// Predicted one-month return.
    pub prediction: f64,
    /// Version of the model that scored the row.
    pub model_version: &'a str,
}

impl<'a> ScoredRow<'a> {
    /// Every scored row of `table`, in table order.
    pub fn all(table: &'a BackfillTable) -> Vec<Self> {
        table
            .iter()
            .zip(table.model_versions())
            .map(|((row, prediction), model_version)| Self {
                row,
                prediction,
                model_version,
            })
            .collect()
    }

    fn missing_cells(&self) -> usize {
        let floats = self
            .row
            .numeric_values()
            .iter()
            .chain(std::iter::once(&self.prediction))
            .filter(|v| !v.is_finite())
            .count();
        let label = usize::from(!self.row.future_1m_return.is_some_and(f64::is_finite));
        let text = [self.row.ticker.as_str(), self.row.sector.as_str(), self.model_version]
            .iter()
            .filter(|s| s.is_empty())
            .count();
        floats + label + text
    }
}

/// Numerical columns compared with the KS test.
fn numerical_columns(rows: &[ScoredRow<'_>]) -> Vec<Vec<f64>> {
    let mut columns = vec![Vec::with_capacity(rows.len()); FLOAT_COLUMNS.len() + 1];
    for scored in rows {
        for (column, value) in columns.iter_mut().zip(scored.row.numeric_values()) {
            column.push(value);
        }
        columns[FLOAT_COLUMNS.len()].push(f64::from(scored.row.month_index));
    }
    columns
}

fn predictions(rows: &[ScoredRow<'_>]) -> Vec<f64> {
    rows.iter().map(|s| s.prediction).collect()
}

fn sectors<'a>(rows: &[ScoredRow<'a>]) -> Vec<&'a str> {
    rows.iter().map(|s| s.row.sector.as_str()).collect()
}

fn labels(rows: &[ScoredRow<'_>]) -> Vec<f64> {
    rows.iter()
        .filter_map(|s| s.row.future_1m_return)
        .filter(|v| v.is_finite())
        .collect()
}

/// Compare one month of scored rows against the reference set.
pub fn compute_metrics(
    timestamp: NaiveDate,
    reference: &[ScoredRow<'_>],
    current: &[ScoredRow<'_>],
    config: &MonitorConfig,
) -> MonthlyMetrics {
    let drifted = |p: Option<f64>| p.is_some_and(|p| p < config.drift_threshold);

    let prediction_drift =
        ks_two_sample(&predictions(reference), &predictions(current)).map(|r| r.p_value);

    let mut p_values: Vec<Option<f64>> = numerical_columns(reference)
        .iter()
        .zip(numerical_columns(current).iter())
        .map(|(r, c)| ks_two_sample(r, c).map(|r| r.p_value))
        .collect();
    p_values.push(prediction_drift);
    p_values.push(ks_two_sample(&labels(reference), &labels(current)).map(|r| r.p_value));
    p_values.push(chi_square_categorical(&sectors(reference), &sectors(current)));

    let num_drifted_columns = p_values.iter().filter(|p| drifted(**p)).count() as u32;

    let cells = current.len() * CELLS_PER_ROW;
    let missing: usize = current.iter().map(ScoredRow::missing_cells).sum();
    let share_missing_values = if cells == 0 { 0.0 } else { missing as f64 / cells as f64 };

    let alphas: Vec<f64> = current.iter().map(|s| s.row.alpha).collect();
    let (low, high) = config.alpha_range;

    MonthlyMetrics {
        timestamp,
        prediction_drift,
        num_drifted_columns,
        share_missing_values,
        median_return: median(labels(current)),
        alpha_out_of_range_share: share_outside(&alphas, low, high).unwrap_or(0.0),
    }
}

/// Compute and store metrics for every monitored month of `table`.
///
/// The sink is prepared once before the first month. Months with no rows
/// are skipped with a warning.
pub fn run_monitoring(
    table: &BackfillTable,
    config: &MonitorConfig,
    sink: &mut dyn MetricsSink,
) -> Result<Vec<MonthlyMetrics>> {
    config.validate()?;
    let scored = ScoredRow::all(table);
    let reference: Vec<ScoredRow<'_>> = scored
        .iter()
        .copied()
        .filter(|s| config.in_reference(s.row.date))
        .collect();
    if reference.is_empty() {
        return Err(MonitorError::InvalidConfig(format!(
            "no rows between {} and {}",
            config.reference_start, config.reference_end
        )));
    }
    info!(reference_rows = reference.len(), "Reference set selected");

    sink.prepare()?;
    let mut results = Vec::new();
    for month in config.months() {
        let current: Vec<ScoredRow<'_>> =
            scored.iter().copied().filter(|s| s.row.date == month).collect();
        if current.is_empty() {
            warn!(%month, "No rows for month, skipping");
            continue;
        }
        let metrics = compute_metrics(month, &reference, &current, config);
        debug!(
            %month,
            rows = current.len(),
            drifted = metrics.num_drifted_columns,
            "Month evaluated"
        );
        sink.write(&metrics)?;
        results.push(metrics);
    }
    info!(months = results.len(), "Monitoring complete");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, i: usize, alpha: f64, label: Option<f64>) -> FeatureRow {
        FeatureRow {
            date,
            ticker: format!("T{i}"),
            alpha,
            beta: 1.0 + (i % 5) as f64 * 0.1,
            month_index: 0,
            index_avg: 0.001,
            historical_vol: 0.02,
            eom_10yr: 4.0,
            avg_10yr: 4.0,
            spread: -0.5,
            vix_avg: 15.0,
            sector: if i % 2 == 0 { "Energy" } else { "Technology" }.to_string(),
            future_1m_return: label,
        }
    }

    #[rstest]
    #[case(d(2024, 1, 1), false)]
    #[case(d(2024, 2, 1), true)]
    #[case(d(2024, 12, 1), true)]
    #[case(d(2025, 1, 1), false)]
    fn test_reference_bounds_are_exclusive(#[case] date: NaiveDate, #[case] inside: bool) {
        assert_eq!(MonitorConfig::default().in_reference(date), inside);
    }

    #[test]
    fn test_default_months() {
        let months = MonitorConfig::default().months();
        assert_eq!(months.len(), 6);
        assert_eq!(months.first(), Some(&d(2025, 1, 1)));
        assert_eq!(months.last(), Some(&d(2025, 6, 1)));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let config = MonitorConfig {
            reference_start: d(2025, 1, 1),
            reference_end: d(2024, 1, 1),
            ..MonitorConfig::default()
        };
        assert!(matches!(config.validate(), Err(MonitorError::InvalidConfig(_))));
    }

    fn scored(rows: &[FeatureRow], prediction: f64) -> Vec<ScoredRow<'_>> {
        rows.iter()
            .map(|row| ScoredRow { row, prediction, model_version: "v1" })
            .collect()
    }

    #[test]
    fn test_same_distribution_has_no_drift() {
        let reference: Vec<FeatureRow> =
            (0..40).map(|i| row(d(2024, 6, 1), i, 0.0, Some(0.01))).collect();
        let current: Vec<FeatureRow> =
            (0..40).map(|i| row(d(2025, 1, 1), i, 0.0, Some(0.01))).collect();

        let metrics = compute_metrics(
            d(2025, 1, 1),
            &scored(&reference, 0.02),
            &scored(&current, 0.02),
            &MonitorConfig::default(),
        );
        assert_eq!(metrics.num_drifted_columns, 0);
        assert_relative_eq!(metrics.prediction_drift.unwrap(), 1.0);
        assert_relative_eq!(metrics.share_missing_values, 0.0);
        assert_relative_eq!(metrics.median_return.unwrap(), 0.01);
        assert_relative_eq!(metrics.alpha_out_of_range_share, 0.0);
    }

    #[test]
    fn test_shifted_predictions_drift() {
        let reference: Vec<FeatureRow> =
            (0..40).map(|i| row(d(2024, 6, 1), i, 0.0, Some(0.01))).collect();
        let current: Vec<FeatureRow> =
            (0..40).map(|i| row(d(2025, 1, 1), i, 0.0, Some(0.01))).collect();

        let metrics = compute_metrics(
            d(2025, 1, 1),
            &scored(&reference, 0.02),
            &scored(&current, 0.5),
            &MonitorConfig::default(),
        );
        assert!(metrics.prediction_drift.unwrap() < 0.05);
        assert_eq!(metrics.num_drifted_columns, 1);
    }

    #[test]
    fn test_missing_labels_and_alpha_range() {
        let rows = vec![
            row(d(2025, 1, 1), 0, 0.01, None),
            row(d(2025, 1, 1), 1, 0.0, Some(0.02)),
        ];
        let scored = scored(&rows, 0.0);

        let metrics = compute_metrics(d(2025, 1, 1), &scored, &scored, &MonitorConfig::default());
        assert_relative_eq!(metrics.share_missing_values, 1.0 / (2 * CELLS_PER_ROW) as f64);
        assert_relative_eq!(metrics.alpha_out_of_range_share, 0.5);
        assert_relative_eq!(metrics.median_return.unwrap(), 0.02);
    }
}
