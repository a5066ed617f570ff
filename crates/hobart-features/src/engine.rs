//! Rolling and single-date feature drivers.
//!
//! Both drivers go through [`FeatureEngine::assemble`], which computes every
//! component for one anchor and inner-joins them on ticker:
//!
//! ```text
//! CAPM(ticker) ⋈ historical_vol(ticker) ⋈ label(ticker)? ⋈ sector(ticker)
//!   × macro factors(date)
//! ```
//!
//! The rolling driver emits anchors from one year after the first stock date
//! up to one month before the last usable date. An anchor whose label window
//! runs past the data is skipped, and an anchor that yields no complete row
//! does not consume a `month_index`.

use crate::aggregate::{MacroFactors, MacroInputs, historical_vol, yield_frame};
use crate::capm::estimate_capm;
use crate::error::Result;
use crate::join::ticker_factors;
use crate::label::forward_returns;
use crate::returns::{benchmark_returns, stock_returns};
use crate::table::{FeatureRow, FeatureTable, LABEL_COLUMN};
use crate::window::{WindowConfig, WindowKind, month_start, months_between, next_month_start};
use chrono::{Months, NaiveDate};
use hobart_data::files::{self, INDEX_TICKER, RawLayout, VIX_TICKER};
use hobart_data::{Maturity, PriceSeries, SectorMap, YieldSeries};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for the feature engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window lengths. The CAPM length is also the warm-up before the first
    /// anchor.
    pub windows: WindowConfig,
}

/// All inputs of the engine as polars frames, read-only for a run.
#[derive(Debug, Clone)]
pub struct MarketData {
    stocks: DataFrame,
    index: DataFrame,
    vix: DataFrame,
    treasury_10y: DataFrame,
    treasury_2y: DataFrame,
    sectors: DataFrame,
    date_range: Option<(NaiveDate, NaiveDate)>,
}

fn sector_frame(sectors: &SectorMap) -> Result<DataFrame> {
    let (tickers, labels): (Vec<&str>, Vec<&str>) = sectors.iter().unzip();
    Ok(DataFrame::new(vec![
        Series::new("ticker".into(), tickers).into(),
        Series::new("sector".into(), labels).into(),
    ])?)
}

impl MarketData {
    /// Build from loaded series. Returns are computed and yields gap-filled
    /// here.
    pub fn new(
        stock_prices: &PriceSeries,
        index_prices: &PriceSeries,
        vix_prices: &PriceSeries,
        treasury_10y: YieldSeries,
        treasury_2y: YieldSeries,
        sectors: SectorMap,
    ) -> Result<Self> {
        let date_range = stock_prices.min_date().zip(stock_prices.max_date());
        Ok(Self {
            stocks: stock_returns(stock_prices)?,
            index: benchmark_returns(index_prices)?,
            vix: benchmark_returns(vix_prices)?,
            treasury_10y: yield_frame(&treasury_10y)?,
            treasury_2y: yield_frame(&treasury_2y)?,
            sectors: sector_frame(&sectors)?,
            date_range,
        })
    }

    /// Load every raw input from a directory. Any schema problem aborts.
    pub fn load(layout: &RawLayout) -> Result<Self> {
        let stocks = files::read_prices(layout.stock_prices())?;
        let index = files::read_benchmark(layout.index_prices(), INDEX_TICKER)?;
        let vix = files::read_benchmark(layout.vix_prices(), VIX_TICKER)?;
        let t10 = files::read_yields(layout.yields(Maturity::TenYear), Maturity::TenYear)?;
        let t2 = files::read_yields(layout.yields(Maturity::TwoYear), Maturity::TwoYear)?;
        let sectors = files::read_sectors(layout.sectors())?;
        info!(
            stock_rows = stocks.len(),
            tickers = stocks.tickers().len(),
            index_rows = index.len(),
            vix_rows = vix.len(),
            sectors = sectors.len(),
            "loaded raw inputs"
        );
        Self::new(&stocks, &index, &vix, t10, t2, sectors)
    }

    /// Stock frame `[date, ticker, price, asset_return]`.
    pub const fn stocks(&self) -> &DataFrame {
        &self.stocks
    }

    /// Index frame `[date, price, market_return]`.
    pub const fn index(&self) -> &DataFrame {
        &self.index
    }

    /// Sector frame `[ticker, sector]`.
    pub const fn sectors(&self) -> &DataFrame {
        &self.sectors
    }

    /// Earliest and latest stock date.
    pub const fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.date_range
    }

    const fn macro_inputs(&self) -> MacroInputs<'_> {
        MacroInputs {
            index: &self.index,
            vix: &self.vix,
            treasury_10y: &self.treasury_10y,
            treasury_2y: &self.treasury_2y,
        }
    }
}

/// Feature engine over one set of market data.
#[derive(Debug)]
pub struct FeatureEngine<'a> {
    data: &'a MarketData,
    config: EngineConfig,
}

impl<'a> FeatureEngine<'a> {
    /// Create an engine with default windows.
    pub fn new(data: &'a MarketData) -> Self {
        Self::with_config(data, EngineConfig::default())
    }

    /// Create an engine with custom configuration.
    pub const fn with_config(data: &'a MarketData, config: EngineConfig) -> Self {
        Self { data, config }
    }

    /// Configuration in use.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// First anchor of the history: the first month start on or after the
    /// earliest stock date plus the CAPM window.
    pub fn first_anchor(&self) -> Option<NaiveDate> {
        let (min_date, _) = self.data.date_range?;
        let warmed = min_date.checked_add_months(Months::new(self.config.windows.capm_months))?;
        next_month_start(warmed)
    }

    /// Month starts from [`first_anchor`](Self::first_anchor) to
    /// `max_usable - label window`, inclusive.
    pub fn anchor_dates(&self, max_usable: NaiveDate) -> Vec<NaiveDate> {
        let Some(first) = self.first_anchor() else {
            return Vec::new();
        };
        let Some(last) =
            max_usable.checked_sub_months(Months::new(self.config.windows.label_months))
        else {
            return Vec::new();
        };
        std::iter::successors(Some(first), |d| d.checked_add_months(Months::new(1)))
            .take_while(|d| *d <= last)
            .collect()
    }

    /// Historical table with labels over every complete anchor.
    ///
    /// `requested_end` caps the usable data; a cap before the first
    /// computable anchor gives an empty table.
    pub fn rolling(&self, requested_end: NaiveDate) -> Result<FeatureTable> {
        let Some((_, max_date)) = self.data.date_range else {
            warn!("no stock data; feature table is empty");
            return Ok(FeatureTable::default());
        };
        let max_usable = requested_end.min(max_date);
        let anchors = self.anchor_dates(max_usable);
        info!(
            anchors = anchors.len(),
            %max_usable,
            "computing rolling features"
        );

        let mut rows = Vec::new();
        let mut month_index = 0u32;
        for anchor in anchors {
            let label_window = self.config.windows.window(anchor, WindowKind::Label);
            if label_window.is_empty() || label_window.end > max_usable {
                debug!(%anchor, "label window incomplete, skipping anchor");
                continue;
            }
            let emitted = self.assemble(anchor, month_index, true)?;
            if emitted.is_empty() {
                debug!(%anchor, "no complete rows, skipping anchor");
                continue;
            }
            debug!(%anchor, month_index, rows = emitted.len(), "anchor assembled");
            rows.extend(emitted);
            month_index += 1;
        }

        let table = FeatureTable::new(rows);
        info!(rows = table.len(), months = month_index, "rolling features complete");
        Ok(table)
    }

    /// Production features for one anchor, without a label.
    ///
    /// The anchor is rounded down to the first day of its month.
    /// `month_index` counts calendar months from the first anchor of the
    /// history, which equals the rolling value when no earlier anchor was
    /// dropped.
    pub fn latest(&self, anchor: NaiveDate) -> Result<FeatureTable> {
        let requested = anchor;
        let anchor = month_start(requested);
        if anchor != requested {
            info!(%requested, %anchor, "anchor rounded down to month start");
        }
        let month_index = self.first_anchor().map_or(0, |first| {
            let months = months_between(first, anchor);
            if months < 0 {
                warn!(%anchor, %first, "anchor precedes the first full CAPM window");
            }
            u32::try_from(months).unwrap_or(0)
        });
        let table = FeatureTable::new(self.assemble(anchor, month_index, false)?);
        info!(%anchor, rows = table.len(), "latest features complete");
        Ok(table)
    }

    /// Rows of one anchor. Shared by both drivers so their numbers agree.
    pub fn assemble(
        &self,
        anchor: NaiveDate,
        month_index: u32,
        with_label: bool,
    ) -> Result<Vec<FeatureRow>> {
        let windows = &self.config.windows;
        let capm_window = windows.window(anchor, WindowKind::Capm);
        let average_window = windows.window(anchor, WindowKind::Average);

        let Some(macros) = MacroFactors::compute(&self.data.macro_inputs(), average_window)? else {
            debug!(%anchor, "market-level factor undefined");
            return Ok(Vec::new());
        };

        let stocks = self.data.stocks.clone().lazy();
        let capm = estimate_capm(stocks.clone(), self.data.index.clone().lazy(), capm_window)?;
        let estimated = capm.height();
        let vol = historical_vol(stocks.clone(), average_window);
        let labels = with_label
            .then(|| forward_returns(stocks, windows.window(anchor, WindowKind::Label)));

        let joined =
            ticker_factors(capm.lazy(), vol, labels, self.data.sectors.clone().lazy()).collect()?;
        if joined.height() < estimated {
            debug!(%anchor, estimated, joined = joined.height(), "tickers dropped by joins");
        }

        let tickers = joined.column("ticker")?.str()?;
        let sectors = joined.column("sector")?.str()?;
        let alpha = joined.column("alpha")?.f64()?;
        let beta = joined.column("beta")?.f64()?;
        let vol = joined.column("historical_vol")?.f64()?;
        let label = joined.column(LABEL_COLUMN)?.f64()?;

        Ok((0..joined.height())
            .filter_map(|i| {
                let row = FeatureRow {
                    date: anchor,
                    ticker: tickers.get(i)?.to_string(),
                    alpha: alpha.get(i)?,
                    beta: beta.get(i)?,
                    month_index,
                    index_avg: macros.index_avg,
                    historical_vol: vol.get(i)?,
                    eom_10yr: macros.eom_10yr,
                    avg_10yr: macros.avg_10yr,
                    spread: macros.spread,
                    vix_avg: macros.vix_avg,
                    sector: sectors.get(i)?.to_string(),
                    future_1m_return: label.get(i),
                };
                row.is_complete().then_some(row)
            })
            .collect())
    }
}
