//! Ticker-keyed inner joins of the per-anchor components.
//!
//! A ticker missing from any side is dropped; that is the missing-data
//! policy of the feature table, not an error.

use crate::table::LABEL_COLUMN;
use polars::prelude::*;

/// Inner join on `ticker`.
pub fn join_on_ticker(left: LazyFrame, right: LazyFrame) -> LazyFrame {
    left.join(
        right,
        [col("ticker")],
        [col("ticker")],
        JoinArgs::new(JoinType::Inner),
    )
}

/// `capm ⋈ vol ⋈ labels? ⋈ sectors`, sorted by ticker.
///
/// Without labels the result still carries a null label column.
pub fn ticker_factors(
    capm: LazyFrame,
    vol: LazyFrame,
    labels: Option<LazyFrame>,
    sectors: LazyFrame,
) -> LazyFrame {
    let joined = join_on_ticker(capm, vol);
    let joined = match labels {
        Some(labels) => join_on_ticker(joined, labels),
        None => joined.with_column(lit(NULL).cast(DataType::Float64).alias(LABEL_COLUMN)),
    };
    join_on_ticker(joined, sectors).sort(["ticker"], SortMultipleOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: &str, tickers: &[&str], values: &[f64]) -> LazyFrame {
        DataFrame::new(vec![
            Series::new("ticker".into(), tickers.to_vec()).into(),
            Series::new(value.into(), values.to_vec()).into(),
        ])
        .unwrap()
        .lazy()
    }

    fn sectors(pairs: &[(&str, &str)]) -> LazyFrame {
        DataFrame::new(vec![
            Series::new("ticker".into(), pairs.iter().map(|p| p.0).collect::<Vec<_>>()).into(),
            Series::new("sector".into(), pairs.iter().map(|p| p.1).collect::<Vec<_>>()).into(),
        ])
        .unwrap()
        .lazy()
    }

    fn tickers(frame: &DataFrame) -> Vec<&str> {
        frame.column("ticker").unwrap().str().unwrap().into_iter().flatten().collect()
    }

    #[test]
    fn test_inner_joins_drop_one_sided_tickers() {
        let joined = ticker_factors(
            frame("alpha", &["C", "A", "B"], &[0.3, 0.1, 0.2]),
            frame("historical_vol", &["A", "B", "C"], &[1.0, 2.0, 3.0]),
            Some(frame(LABEL_COLUMN, &["A", "C", "D"], &[0.01, 0.03, 0.04])),
            sectors(&[("A", "Energy"), ("B", "Utilities")]),
        )
        .collect()
        .unwrap();

        assert_eq!(tickers(&joined), vec!["A"]);
        let label = joined.column(LABEL_COLUMN).unwrap().f64().unwrap().get(0);
        assert_eq!(label, Some(0.01));
    }

    #[test]
    fn test_without_labels_keeps_rows_with_null_label() {
        let joined = ticker_factors(
            frame("alpha", &["B", "A"], &[0.2, 0.1]),
            frame("historical_vol", &["A", "B"], &[1.0, 2.0]),
            None,
            sectors(&[("A", "Energy"), ("B", "Utilities")]),
        )
        .collect()
        .unwrap();

        assert_eq!(tickers(&joined), vec!["A", "B"]);
        assert_eq!(joined.column(LABEL_COLUMN).unwrap().null_count(), 2);
    }
}
