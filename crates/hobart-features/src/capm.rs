//! CAPM alpha and beta by ordinary least squares.
//!
//! Within the regression window the stock returns are laid out on a
//! dates × tickers grid over the union of stock trading dates, then each
//! ticker is forward-filled and back-filled. The index return is aligned to
//! the same dates and filled the same way. Every ticker is then regressed on
//! `[1, index_return]` at once.
//!
//! A rank-deficient design (a constant index return, or a single date) has
//! no unique solution; the minimum-norm least-squares solution is returned
//! instead, matching an SVD solver with the default `rcond`.

use crate::error::Result;
use crate::window::Window;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::*;
use tracing::debug;

fn estimate_frame(tickers: Vec<&str>, alpha: Vec<f64>, beta: Vec<f64>) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new("ticker".into(), tickers).into(),
        Series::new("alpha".into(), alpha).into(),
        Series::new("beta".into(), beta).into(),
    ])?)
}

/// Estimate alpha and beta of every ticker with data in `window`, as
/// `[ticker, alpha, beta]` sorted by ticker.
///
/// Tickers whose window holds no resolvable return are left out, and the
/// frame is empty when the index has no resolvable return in the window.
pub fn estimate_capm(stocks: LazyFrame, index: LazyFrame, window: Window) -> Result<DataFrame> {
    let in_window = stocks
        .filter(window.predicate())
        .select([col("date"), col("ticker"), col("asset_return")]);
    let dates = in_window
        .clone()
        .select([col("date")])
        .unique_stable(None, UniqueKeepStrategy::First)
        .sort(["date"], SortMultipleOptions::default());

    let market = dates
        .clone()
        .join(
            index.select([col("date"), col("market_return")]),
            [col("date")],
            [col("date")],
            JoinArgs::new(JoinType::Left),
        )
        .sort(["date"], SortMultipleOptions::default())
        .with_column(col("market_return").forward_fill(None).backward_fill(None))
        .collect()?;
    let market: Option<Vec<f64>> = market.column("market_return")?.f64()?.into_iter().collect();
    let market = match market {
        Some(market) if !market.is_empty() => market,
        Some(_) => return estimate_frame(Vec::new(), Vec::new(), Vec::new()),
        None => {
            debug!(start = %window.start, end = %window.end, "index has no returns in window");
            return estimate_frame(Vec::new(), Vec::new(), Vec::new());
        }
    };

    let tickers = in_window
        .clone()
        .select([col("ticker")])
        .unique_stable(None, UniqueKeepStrategy::First);
    let grid = dates
        .cross_join(tickers, None)
        .join(
            in_window,
            [col("date"), col("ticker")],
            [col("date"), col("ticker")],
            JoinArgs::new(JoinType::Left),
        )
        .sort(["ticker", "date"], SortMultipleOptions::default())
        .with_column(
            col("asset_return")
                .forward_fill(None)
                .backward_fill(None)
                .over([col("ticker")]),
        )
        .filter(col("asset_return").is_not_null())
        .collect()?;

    let n = market.len();
    let k = grid.height() / n;
    let names: Vec<&str> = grid
        .column("ticker")?
        .str()?
        .into_iter()
        .step_by(n)
        .flatten()
        .collect();
    let returns: Vec<f64> = grid.column("asset_return")?.f64()?.into_no_null_iter().collect();
    // one row of `k × n` per ticker; transpose to dates × tickers
    let y = Array2::from_shape_vec((k, n), returns)?.reversed_axes();
    let coefficients = fit_market_model(Array1::from(market).view(), y.view());

    estimate_frame(
        names,
        coefficients.row(0).to_vec(),
        coefficients.row(1).to_vec(),
    )
}

/// Least-squares fit of every column of `y` on `[1, market]`.
///
/// Returns a `2 × k` matrix whose first row holds intercepts and second row
/// slopes. The regression is solved in centered form; when the design's
/// smallest singular value falls below `eps · max(n, 2) · σ_max` the
/// minimum-norm solution of the rank-one design is returned.
pub fn fit_market_model(market: ArrayView1<'_, f64>, y: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = market.len();
    let k = y.ncols();
    let mut coefficients = Array2::zeros((2, k));
    if n == 0 {
        return coefficients;
    }

    let market_mean = market.sum() / n as f64;
    let centered = market.mapv(|m| m - market_mean);
    let variance = centered.dot(&centered);
    let sum_sq = market.dot(&market);
    let y_mean = y.sum_axis(Axis(0)) / n as f64;

    // Singular values of [1, m]: det = n·var, trace = n + Σm².
    let trace = n as f64 + sum_sq;
    let det = n as f64 * variance;
    let disc = (trace * trace - 4.0 * det).max(0.0).sqrt();
    let sigma_max_sq = 0.5 * (trace + disc);
    let sigma_min_sq = if sigma_max_sq > 0.0 { det / sigma_max_sq } else { 0.0 };
    let cutoff = f64::EPSILON * n.max(2) as f64;

    if sigma_min_sq > cutoff * cutoff * sigma_max_sq {
        let betas = centered.dot(&y) / variance;
        for j in 0..k {
            coefficients[[1, j]] = betas[j];
            coefficients[[0, j]] = y_mean[j] - betas[j] * market_mean;
        }
    } else {
        // Rank one: every row is [1, c]; the minimum-norm solution is
        // (1, c) · ȳ / (1 + c²).
        let scale = 1.0 + market_mean * market_mean;
        for j in 0..k {
            coefficients[[0, j]] = y_mean[j] / scale;
            coefficients[[1, j]] = market_mean * y_mean[j] / scale;
        }
    }
    coefficients
}
