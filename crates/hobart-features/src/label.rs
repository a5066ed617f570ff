//! Forward one-month returns used as training labels.

use crate::table::LABEL_COLUMN;
use crate::window::Window;
use polars::prelude::*;

/// Realized return `(last - first) / first` of every ticker over `window`,
/// as `[ticker, future_1m_return]`.
///
/// Prices are taken in date order with absent prices skipped. Tickers with
/// fewer than two prices, or a zero first price, get no label.
pub fn forward_returns(stocks: LazyFrame, window: Window) -> LazyFrame {
    stocks
        .filter(window.predicate().and(col("price").is_not_null()))
        .sort(["ticker", "date"], SortMultipleOptions::default())
        .group_by_stable([col("ticker")])
        .agg([
            col("price").first().alias("first"),
            col("price").last().alias("last"),
            len().alias("observations"),
        ])
        .filter(
            col("observations")
                .gt_eq(lit(2))
                .and(col("first").neq(lit(0.0))),
        )
        .select([
            col("ticker"),
            ((col("last") - col("first")) / col("first")).alias(LABEL_COLUMN),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::returns::stock_returns;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use hobart_data::{PriceObservation, PriceSeries};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn labels(prices: Vec<PriceObservation>) -> Vec<(String, f64)> {
        let stocks = stock_returns(&PriceSeries::new(prices)).unwrap();
        let frame = forward_returns(stocks.lazy(), Window::new(d(2024, 2, 1), d(2024, 3, 1)))
            .collect()
            .unwrap();
        let tickers = frame.column("ticker").unwrap().str().unwrap();
        let values = frame.column(LABEL_COLUMN).unwrap().f64().unwrap();
        tickers
            .into_iter()
            .zip(values)
            .filter_map(|(t, v)| Some((t?.to_string(), v?)))
            .collect()
    }

    #[test]
    fn test_forward_returns_skip_missing_prices_and_short_windows() {
        let labels = labels(vec![
            PriceObservation::new(d(2024, 1, 31), "AAA", Some(1.0)),
            PriceObservation::new(d(2024, 2, 1), "AAA", Some(100.0)),
            PriceObservation::new(d(2024, 2, 15), "AAA", None),
            PriceObservation::new(d(2024, 2, 29), "AAA", Some(105.0)),
            PriceObservation::new(d(2024, 3, 1), "AAA", Some(500.0)),
            PriceObservation::new(d(2024, 2, 5), "BBB", Some(10.0)),
        ]);

        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].0, "AAA");
        assert_relative_eq!(labels[0].1, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_label_uses_first_and_last_not_path() {
        let labels = labels(vec![
            PriceObservation::new(d(2024, 2, 1), "AAA", Some(100.0)),
            PriceObservation::new(d(2024, 2, 2), "AAA", Some(90.0)),
            PriceObservation::new(d(2024, 2, 5), "AAA", Some(110.0)),
            PriceObservation::new(d(2024, 2, 1), "ZERO", Some(0.0)),
            PriceObservation::new(d(2024, 2, 2), "ZERO", Some(5.0)),
        ]);

        assert_eq!(labels.len(), 1);
        assert_relative_eq!(labels[0].1, 0.1, epsilon = 1e-12);
    }
}
