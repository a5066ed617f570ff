//! Daily simple returns as polars frames.
//!
//! Stock frames carry `[date, ticker, price, asset_return]` sorted by
//! (ticker, date); benchmark frames carry `[date, price, market_return]`
//! sorted by date.

use crate::error::Result;
use hobart_data::PriceSeries;
use polars::prelude::*;

/// `price / previous - 1`, null when either side is null or `previous` is zero.
fn simple_return(price: Expr, previous: Expr) -> Expr {
    when(previous.clone().eq(lit(0.0)))
        .then(lit(NULL).cast(DataType::Float64))
        .otherwise(price / previous - lit(1.0))
}

/// Frame `[date, ticker, price]` of a price series, absent prices as nulls.
pub fn price_frame(prices: &PriceSeries) -> Result<DataFrame> {
    let observations = prices.observations();
    let columns: Vec<Column> = vec![
        Series::new(
            "date".into(),
            observations.iter().map(|o| o.date).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "ticker".into(),
            observations.iter().map(|o| o.ticker.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "price".into(),
            observations.iter().map(|o| o.price).collect::<Vec<_>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Add `asset_return` per ticker over consecutive rows.
///
/// The first row of a ticker never has a return, and a row whose price or
/// predecessor price is absent has none either.
pub fn compute_returns(prices: LazyFrame) -> LazyFrame {
    prices
        .sort(["ticker", "date"], SortMultipleOptions::default())
        .with_column(
            simple_return(col("price"), col("price").shift(lit(1)).over([col("ticker")]))
                .alias("asset_return"),
        )
}

/// Stock frame with returns, sorted by (ticker, date).
pub fn stock_returns(prices: &PriceSeries) -> Result<DataFrame> {
    Ok(compute_returns(price_frame(prices)?.lazy())
        .select([col("date"), col("ticker"), col("price"), col("asset_return")])
        .collect()?)
}

/// Benchmark frame, treating every row as one instrument and keeping the
/// first row of any repeated date.
pub fn benchmark_returns(prices: &PriceSeries) -> Result<DataFrame> {
    Ok(price_frame(prices)?
        .lazy()
        .sort(
            ["date"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .unique_stable(Some(vec!["date".into()]), UniqueKeepStrategy::First)
        .with_column(simple_return(col("price"), col("price").shift(lit(1))).alias("market_return"))
        .select([col("date"), col("price"), col("market_return")])
        .collect()?)
}
