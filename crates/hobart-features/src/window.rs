//! Half-open date windows around an anchor date.
//!
//! Month arithmetic clamps to the last valid day of the target month, so
//! 2024-02-29 minus one year is 2023-02-28 and 2024-03-31 minus one month is
//! 2024-02-29. Arithmetic past the calendar limits yields an empty window.

use chrono::{Datelike, Months, NaiveDate};
use polars::prelude::{Expr, col, lit};
use serde::{Deserialize, Serialize};

/// Which window to derive from an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowKind {
    /// Trailing regression window, `[anchor - capm, anchor)`.
    Capm,
    /// Trailing averaging and volatility window, `[anchor - average, anchor)`.
    Average,
    /// Forward label window, `[anchor, anchor + label)`.
    Label,
}

/// Window lengths in calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Length of the CAPM window (default: 12).
    pub capm_months: u32,
    /// Length of the averaging window (default: 1).
    pub average_months: u32,
    /// Length of the label window (default: 1).
    pub label_months: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capm_months: 12,
            average_months: 1,
            label_months: 1,
        }
    }
}

impl WindowConfig {
    /// Window of `kind` for `anchor`.
    pub fn window(&self, anchor: NaiveDate, kind: WindowKind) -> Window {
        match kind {
            WindowKind::Capm => Window::trailing(anchor, self.capm_months),
            WindowKind::Average => Window::trailing(anchor, self.average_months),
            WindowKind::Label => Window::forward(anchor, self.label_months),
        }
    }
}

/// A half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive lower bound.
    pub start: NaiveDate,
    /// Exclusive upper bound.
    pub end: NaiveDate,
}

impl Window {
    /// Create `[start, end)`.
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `[anchor - months, anchor)`.
    pub fn trailing(anchor: NaiveDate, months: u32) -> Self {
        anchor
            .checked_sub_months(Months::new(months))
            .map_or_else(|| Self::empty_at(anchor), |start| Self::new(start, anchor))
    }

    /// `[anchor, anchor + months)`.
    pub fn forward(anchor: NaiveDate, months: u32) -> Self {
        anchor
            .checked_add_months(Months::new(months))
            .map_or_else(|| Self::empty_at(anchor), |end| Self::new(anchor, end))
    }

    const fn empty_at(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Whether the window covers no date.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Row predicate on the `date` column, `start <= date < end`.
    pub fn predicate(&self) -> Expr {
        col("date")
            .gt_eq(lit(self.start))
            .and(col("date").lt(lit(self.end)))
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// `date` if it is a month start, otherwise the first day of the next month.
pub fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    if date.day() == 1 {
        Some(date)
    } else {
        month_start(date).checked_add_months(Months::new(1))
    }
}

/// Whole calendar months from the month of `from` to the month of `to`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{DataFrame, IntoLazy, NamedFrom, Series};
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[rstest]
    #[case(WindowKind::Capm, d(2024, 3, 1), d(2023, 3, 1), d(2024, 3, 1))]
    #[case(WindowKind::Average, d(2024, 3, 1), d(2024, 2, 1), d(2024, 3, 1))]
    #[case(WindowKind::Label, d(2024, 3, 1), d(2024, 3, 1), d(2024, 4, 1))]
    #[case(WindowKind::Capm, d(2024, 2, 29), d(2023, 2, 28), d(2024, 2, 29))]
    #[case(WindowKind::Average, d(2024, 3, 31), d(2024, 2, 29), d(2024, 3, 31))]
    #[case(WindowKind::Label, d(2024, 1, 31), d(2024, 1, 31), d(2024, 2, 29))]
    fn test_window_bounds(
        #[case] kind: WindowKind,
        #[case] anchor: NaiveDate,
        #[case] start: NaiveDate,
        #[case] end: NaiveDate,
    ) {
        let window = WindowConfig::default().window(anchor, kind);
        assert_eq!(window, Window::new(start, end));
    }

    #[test]
    fn test_window_is_half_open() {
        let window = Window::new(d(2024, 2, 1), d(2024, 3, 1));
        assert!(window.contains(d(2024, 2, 1)));
        assert!(window.contains(d(2024, 2, 29)));
        assert!(!window.contains(d(2024, 3, 1)));
        assert!(!window.contains(d(2024, 1, 31)));
    }

    #[test]
    fn test_predicate_filters_half_open() {
        let frame = DataFrame::new(vec![
            Series::new(
                "date".into(),
                vec![d(2024, 1, 31), d(2024, 2, 1), d(2024, 2, 15), d(2024, 3, 1)],
            )
            .into(),
        ])
        .unwrap();
        let window = Window::new(d(2024, 2, 1), d(2024, 3, 1));

        let kept = frame.clone().lazy().filter(window.predicate()).collect().unwrap();
        let dates: Vec<_> = kept.column("date").unwrap().date().unwrap().as_date_iter().flatten().collect();
        assert_eq!(dates, vec![d(2024, 2, 1), d(2024, 2, 15)]);

        let empty = Window::new(d(2025, 1, 1), d(2025, 2, 1));
        assert_eq!(frame.lazy().filter(empty.predicate()).collect().unwrap().height(), 0);
    }

    #[test]
    fn test_overflow_yields_empty_window() {
        let window = Window::forward(NaiveDate::MAX, 1);
        assert!(window.is_empty());
        assert!(!window.contains(NaiveDate::MAX));
    }

    #[test]
    fn test_month_helpers() {
        assert_eq!(next_month_start(d(2023, 7, 1)), Some(d(2023, 7, 1)));
        assert_eq!(next_month_start(d(2023, 7, 5)), Some(d(2023, 8, 1)));
        assert_eq!(next_month_start(d(2023, 12, 5)), Some(d(2024, 1, 1)));
        assert_eq!(months_between(d(2023, 7, 1), d(2025, 2, 1)), 19);
        assert_eq!(month_start(d(2024, 2, 29)), d(2024, 2, 1));
    }
}
