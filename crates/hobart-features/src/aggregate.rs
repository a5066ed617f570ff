//! Reductions over windowed frames.
//!
//! Every aggregate is null for an empty window rather than a default, so
//! undefined values propagate to the row filter.

use crate::error::Result;
use crate::window::Window;
use hobart_data::YieldSeries;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Frame `[date, value]` of a yield series, forward- then back-filled over
/// the published rows.
pub fn yield_frame(series: &YieldSeries) -> Result<DataFrame> {
    let observations = series.observations();
    let columns: Vec<Column> = vec![
        Series::new(
            "date".into(),
            observations.iter().map(|o| o.date).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "value".into(),
            observations.iter().map(|o| o.value).collect::<Vec<_>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?
        .lazy()
        .sort(["date"], SortMultipleOptions::default())
        .with_column(col("value").forward_fill(None).backward_fill(None))
        .collect()?)
}

/// Per-ticker sample volatility (ddof = 1) of returns inside `window`, as
/// `[ticker, historical_vol]`.
///
/// Tickers with fewer than two returns in the window are omitted.
pub fn historical_vol(stocks: LazyFrame, window: Window) -> LazyFrame {
    stocks
        .filter(window.predicate().and(col("asset_return").is_not_null()))
        .group_by_stable([col("ticker")])
        .agg([
            col("asset_return").std(1).alias("historical_vol"),
            len().alias("observations"),
        ])
        .filter(col("observations").gt_eq(lit(2)))
        .select([col("ticker"), col("historical_vol")])
}

/// First value of `name` in a one-row aggregate frame.
fn scalar(frame: &DataFrame, name: &str) -> Result<Option<f64>> {
    Ok(frame.column(name)?.cast(&DataType::Float64)?.f64()?.get(0))
}

/// Date-level market features shared by every ticker of one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroFactors {
    /// Mean daily index return.
    pub index_avg: f64,
    /// Last 10-year yield in the window.
    pub eom_10yr: f64,
    /// Mean 10-year yield.
    pub avg_10yr: f64,
    /// Last 10-year minus last 2-year yield.
    pub spread: f64,
    /// Mean VIX level.
    pub vix_avg: f64,
}

/// Date-level inputs of [`MacroFactors`].
#[derive(Debug, Clone, Copy)]
pub struct MacroInputs<'a> {
    /// Index frame `[date, price, market_return]`.
    pub index: &'a DataFrame,
    /// VIX frame `[date, price, ..]`.
    pub vix: &'a DataFrame,
    /// Gap-filled 10-year yields `[date, value]`.
    pub treasury_10y: &'a DataFrame,
    /// Gap-filled 2-year yields `[date, value]`.
    pub treasury_2y: &'a DataFrame,
}

impl MacroFactors {
    /// Aggregate every input over `window`; `None` when any is undefined.
    pub fn compute(inputs: &MacroInputs<'_>, window: Window) -> Result<Option<Self>> {
        let windowed = |frame: &DataFrame, aggs: Vec<Expr>| -> Result<DataFrame> {
            Ok(frame.clone().lazy().filter(window.predicate()).select(aggs).collect()?)
        };

        let index = windowed(inputs.index, vec![col("market_return").mean().alias("index_avg")])?;
        let vix = windowed(inputs.vix, vec![col("price").mean().alias("vix_avg")])?;
        let t10 = windowed(
            inputs.treasury_10y,
            vec![
                col("value").drop_nulls().last().alias("eom"),
                col("value").mean().alias("avg"),
            ],
        )?;
        let t2 = windowed(
            inputs.treasury_2y,
            vec![col("value").drop_nulls().last().alias("eom")],
        )?;

        let values = (
            scalar(&index, "index_avg")?,
            scalar(&t10, "eom")?,
            scalar(&t10, "avg")?,
            scalar(&t2, "eom")?,
            scalar(&vix, "vix_avg")?,
        );
        Ok(match values {
            (Some(index_avg), Some(eom_10yr), Some(avg_10yr), Some(eom_2yr), Some(vix_avg)) => {
                Some(Self {
                    index_avg,
                    eom_10yr,
                    avg_10yr,
                    spread: eom_10yr - eom_2yr,
                    vix_avg,
                })
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::returns::{benchmark_returns, stock_returns};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use hobart_data::{Maturity, PriceObservation, PriceSeries, YieldObservation};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn yields(maturity: Maturity, values: &[(NaiveDate, Option<f64>)]) -> DataFrame {
        yield_frame(&YieldSeries::new(
            maturity,
            values
                .iter()
                .map(|(date, value)| YieldObservation { date: *date, value: *value })
                .collect(),
        ))
        .unwrap()
    }

    fn benchmark(ticker: &str, values: &[(NaiveDate, f64)]) -> DataFrame {
        benchmark_returns(&PriceSeries::new(
            values
                .iter()
                .map(|(date, p)| PriceObservation::new(*date, ticker, Some(*p)))
                .collect(),
        ))
        .unwrap()
    }

    #[test]
    fn test_yield_frame_fills_both_directions() {
        let frame = yields(
            Maturity::TenYear,
            &[(d(2024, 1, 2), None), (d(2024, 1, 3), Some(4.0)), (d(2024, 1, 4), None)],
        );
        let values: Vec<_> = frame.column("value").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(4.0), Some(4.0), Some(4.0)]);
    }

    #[test]
    fn test_macro_factors() {
        let window = Window::new(d(2024, 2, 1), d(2024, 3, 1));
        let index = benchmark(
            "SPX",
            &[(d(2024, 1, 31), 100.0), (d(2024, 2, 1), 101.0), (d(2024, 2, 2), 99.99), (d(2024, 3, 1), 500.0)],
        );
        let vix = benchmark("VIX", &[(d(2024, 2, 1), 14.0), (d(2024, 2, 2), 16.0), (d(2024, 3, 1), 40.0)]);
        let t10 = yields(
            Maturity::TenYear,
            &[(d(2024, 2, 1), Some(4.0)), (d(2024, 2, 29), Some(4.3)), (d(2024, 3, 1), Some(5.0))],
        );
        let t2 = yields(Maturity::TwoYear, &[(d(2024, 2, 1), Some(4.5)), (d(2024, 2, 29), Some(4.6))]);

        let factors = MacroFactors::compute(
            &MacroInputs { index: &index, vix: &vix, treasury_10y: &t10, treasury_2y: &t2 },
            window,
        )
        .unwrap()
        .unwrap();

        assert_relative_eq!(factors.index_avg, (0.01 + (-0.01)) / 2.0, epsilon = 1e-12);
        assert_relative_eq!(factors.vix_avg, 15.0);
        assert_relative_eq!(factors.eom_10yr, 4.3);
        assert_relative_eq!(factors.avg_10yr, 4.15, epsilon = 1e-12);
        assert_relative_eq!(factors.spread, 4.3 - 4.6, epsilon = 1e-12);
    }

    #[test]
    fn test_macro_factors_undefined_without_vix() {
        let window = Window::new(d(2024, 2, 1), d(2024, 3, 1));
        let index = benchmark("SPX", &[(d(2024, 1, 31), 100.0), (d(2024, 2, 1), 101.0)]);
        let vix = benchmark("VIX", &[(d(2024, 1, 30), 20.0)]);
        let t10 = yields(Maturity::TenYear, &[(d(2024, 2, 1), Some(4.0))]);
        let t2 = yields(Maturity::TwoYear, &[(d(2024, 2, 1), Some(4.5))]);

        let factors = MacroFactors::compute(
            &MacroInputs { index: &index, vix: &vix, treasury_10y: &t10, treasury_2y: &t2 },
            window,
        )
        .unwrap();
        assert!(factors.is_none());
    }

    #[test]
    fn test_historical_vol_skips_short_tickers() {
        let prices = PriceSeries::new(vec![
            PriceObservation::new(d(2024, 1, 31), "AAA", Some(100.0)),
            PriceObservation::new(d(2024, 2, 1), "AAA", Some(101.0)),
            PriceObservation::new(d(2024, 2, 2), "AAA", Some(99.99)),
            PriceObservation::new(d(2024, 2, 1), "BBB", Some(10.0)),
            PriceObservation::new(d(2024, 2, 2), "BBB", Some(11.0)),
        ]);
        let stocks = stock_returns(&prices).unwrap();
        let vol = historical_vol(stocks.lazy(), Window::new(d(2024, 2, 1), d(2024, 3, 1)))
            .collect()
            .unwrap();

        assert_eq!(vol.height(), 1);
        let ticker = vol.column("ticker").unwrap().str().unwrap().get(0);
        assert_eq!(ticker, Some("AAA"));
        // returns 0.01 and -0.01: sample std is 0.02 / sqrt(2)
        let value = vol.column("historical_vol").unwrap().f64().unwrap().get(0).unwrap();
        assert_relative_eq!(value, 0.02 / 2.0_f64.sqrt(), epsilon = 1e-12);
    }
}
