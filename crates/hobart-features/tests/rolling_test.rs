//! End-to-end properties of the rolling and single-date drivers.

use approx::assert_abs_diff_eq;
use chrono::{Datelike, NaiveDate, Weekday};
use hobart_data::{
    Maturity, PriceObservation, PriceSeries, SectorMap, YieldObservation, YieldSeries,
};
use hobart_features::{FeatureEngine, FeatureRow, FeatureTable, MarketData};
use rstest::rstest;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|date| *date <= end)
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

/// Daily market return oscillating around 0.1%.
fn market_return(t: usize) -> f64 {
    0.001 + 0.008 * (t as f64 * 0.7).sin()
}

/// Raw inputs of a synthetic market.
struct Scenario {
    stocks: Vec<PriceObservation>,
    index: Vec<PriceObservation>,
    vix: Vec<PriceObservation>,
    t10: Vec<YieldObservation>,
    t2: Vec<YieldObservation>,
    sectors: SectorMap,
}

impl Scenario {
    /// A tracks the market, B has twice its beta, C is unmapped.
    fn new(end: NaiveDate) -> Self {
        let dates = weekdays(d(2022, 1, 3), end);
        let (mut spx, mut a, mut b, mut c) = (4000.0, 100.0, 50.0, 20.0);
        let mut scenario = Self {
            stocks: Vec::new(),
            index: Vec::new(),
            vix: Vec::new(),
            t10: Vec::new(),
            t2: Vec::new(),
            sectors: [("A", "Technology"), ("B", "Energy")].into_iter().collect(),
        };
        for (t, date) in dates.iter().enumerate() {
            if t > 0 {
                let r = market_return(t);
                spx *= 1.0 + r;
                a *= 1.0 + r;
                b *= 1.0 + 2.0 * r;
                c *= 1.0 + 0.5 * r;
            }
            scenario.index.push(PriceObservation::new(*date, "SPX", Some(spx)));
            scenario.stocks.push(PriceObservation::new(*date, "A", Some(a)));
            scenario.stocks.push(PriceObservation::new(*date, "B", Some(b)));
            scenario.stocks.push(PriceObservation::new(*date, "C", Some(c)));
            scenario.vix.push(PriceObservation::new(*date, "VIX", Some(15.0 + (t % 10) as f64)));
            scenario.t10.push(YieldObservation { date: *date, value: Some(3.0 + t as f64 * 0.001) });
            scenario.t2.push(YieldObservation { date: *date, value: Some(3.5 + t as f64 * 0.0005) });
        }
        scenario
    }

    fn market(&self) -> MarketData {
        MarketData::new(
            &PriceSeries::new(self.stocks.clone()),
            &PriceSeries::new(self.index.clone()),
            &PriceSeries::new(self.vix.clone()),
            YieldSeries::new(Maturity::TenYear, self.t10.clone()),
            YieldSeries::new(Maturity::TwoYear, self.t2.clone()),
            self.sectors.clone(),
        )
        .unwrap()
    }
}

fn features_only(row: &FeatureRow) -> FeatureRow {
    FeatureRow {
        future_1m_return: None,
        ..row.clone()
    }
}

#[test]
fn test_two_ticker_betas() {
    let data = Scenario::new(d(2023, 6, 30)).market();
    let table = FeatureEngine::new(&data).rolling(d(2023, 6, 30)).unwrap();

    assert!(!table.is_empty());
    for row in table.rows() {
        let expected_beta = match row.ticker.as_str() {
            "A" => 1.0,
            "B" => 2.0,
            other => panic!("unexpected ticker {other}"),
        };
        assert_abs_diff_eq!(row.beta, expected_beta, epsilon = 1e-8);
        assert_abs_diff_eq!(row.alpha, 0.0, epsilon = 1e-10);
    }
}

#[test]
fn test_unmapped_ticker_excluded() {
    let data = Scenario::new(d(2023, 6, 30)).market();
    let table = FeatureEngine::new(&data).rolling(d(2023, 6, 30)).unwrap();
    assert!(table.rows().iter().all(|r| r.ticker != "C"));
    assert!(table.rows().iter().any(|r| r.ticker == "A"));
}

#[test]
fn test_month_index_contiguous_and_dates_monthly() {
    let data = Scenario::new(d(2023, 6, 30)).market();
    let table = FeatureEngine::new(&data).rolling(d(2023, 6, 30)).unwrap();

    let dates = table.dates();
    // 2022-01-03 plus one year rounds up to February
    assert_eq!(dates.first(), Some(&d(2023, 2, 1)));
    assert_eq!(dates.last(), Some(&d(2023, 5, 1)));
    for (i, date) in dates.iter().enumerate() {
        for row in table.rows_on(*date) {
            assert_eq!(row.month_index, i as u32);
        }
    }
}

#[test]
fn test_interior_anchor_without_vix_keeps_index_contiguous() {
    let mut scenario = Scenario::new(d(2023, 6, 30));
    scenario
        .vix
        .retain(|obs| obs.date < d(2023, 3, 1) || obs.date >= d(2023, 4, 1));
    let data = scenario.market();
    let engine = FeatureEngine::new(&data);
    let table = engine.rolling(d(2023, 6, 30)).unwrap();

    assert_eq!(table.dates(), vec![d(2023, 2, 1), d(2023, 3, 1), d(2023, 5, 1)]);
    assert!(table.rows_on(d(2023, 3, 1)).iter().all(|r| r.month_index == 1));
    assert!(table.rows_on(d(2023, 5, 1)).iter().all(|r| r.month_index == 2));

    // the single-date driver counts calendar months, so it runs one ahead
    // after a dropped anchor
    let latest = engine.latest(d(2023, 5, 1)).unwrap();
    assert!(!latest.is_empty());
    assert!(latest.rows().iter().all(|r| r.month_index == 3));
    let expected: Vec<FeatureRow> = table
        .rows_on(d(2023, 5, 1))
        .iter()
        .map(|r| FeatureRow { month_index: 3, ..features_only(r) })
        .collect();
    assert_eq!(latest.rows(), expected.as_slice());
}

#[test]
fn test_mid_month_anchor_rounds_down() {
    let data = Scenario::new(d(2023, 6, 30)).market();
    let engine = FeatureEngine::new(&data);
    let rolling = engine.rolling(d(2023, 6, 30)).unwrap();
    let latest = engine.latest(d(2023, 3, 17)).unwrap();

    let expected: Vec<FeatureRow> = rolling.rows_on(d(2023, 3, 1)).iter().map(features_only).collect();
    assert!(!expected.is_empty());
    assert_eq!(latest.rows(), expected.as_slice());
}

#[test]
fn test_incomplete_label_month_skipped() {
    let data = Scenario::new(d(2023, 6, 20)).market();
    let table = FeatureEngine::new(&data).rolling(d(2023, 12, 31)).unwrap();
    assert!(!table.dates().contains(&d(2023, 6, 1)));
    assert_eq!(table.dates().last(), Some(&d(2023, 5, 1)));
}

#[test]
fn test_requested_end_caps_history() {
    let data = Scenario::new(d(2023, 6, 30)).market();
    let table = FeatureEngine::new(&data).rolling(d(2023, 4, 1)).unwrap();
    assert_eq!(table.dates().last(), Some(&d(2023, 3, 1)));
}

#[rstest]
#[case(d(2023, 2, 1))]
#[case(d(2023, 3, 1))]
#[case(d(2023, 5, 1))]
fn test_latest_matches_rolling(#[case] anchor: NaiveDate) {
    let data = Scenario::new(d(2023, 6, 30)).market();
    let engine = FeatureEngine::new(&data);
    let rolling = engine.rolling(d(2023, 6, 30)).unwrap();
    let latest = engine.latest(anchor).unwrap();

    let expected: Vec<FeatureRow> = rolling.rows_on(anchor).iter().map(features_only).collect();
    assert!(!expected.is_empty());
    assert_eq!(latest.rows(), expected.as_slice());
}

#[test]
fn test_no_lookahead() {
    let anchor = d(2023, 3, 1);
    let scenario = Scenario::new(d(2023, 6, 30));
    let mut shocked = Scenario::new(d(2023, 6, 30));
    for obs in shocked.stocks.iter_mut().chain(&mut shocked.index).chain(&mut shocked.vix) {
        if obs.date >= anchor {
            obs.price = obs.price.map(|p| p * 3.0 + 1.0);
        }
    }
    for obs in shocked.t10.iter_mut().chain(&mut shocked.t2) {
        if obs.date >= anchor {
            obs.value = Some(9.0);
        }
    }

    let base = scenario.market();
    let perturbed = shocked.market();
    let base_rows = FeatureEngine::new(&base).rolling(d(2023, 6, 30)).unwrap();
    let perturbed_rows = FeatureEngine::new(&perturbed).rolling(d(2023, 6, 30)).unwrap();

    let before: Vec<_> = base_rows.rows_on(anchor).iter().map(features_only).collect();
    let after: Vec<_> = perturbed_rows.rows_on(anchor).iter().map(features_only).collect();
    assert!(!before.is_empty());
    assert_eq!(before, after);

    let label_changed = base_rows
        .rows_on(anchor)
        .iter()
        .zip(perturbed_rows.rows_on(anchor))
        .any(|(a, b)| a.future_1m_return != b.future_1m_return);
    assert!(label_changed);
}

#[test]
fn test_degenerate_market_gives_mean_alpha() {
    let dates = weekdays(d(2022, 1, 3), d(2023, 4, 28));
    let mut price = 10.0;
    let mut stocks = Vec::new();
    let mut index = Vec::new();
    let mut vix = Vec::new();
    let mut yields = Vec::new();
    for (t, date) in dates.iter().enumerate() {
        if t > 0 {
            price *= 1.002;
        }
        stocks.push(PriceObservation::new(*date, "FLAT", Some(price)));
        index.push(PriceObservation::new(*date, "SPX", Some(4000.0)));
        vix.push(PriceObservation::new(*date, "VIX", Some(20.0)));
        yields.push(YieldObservation { date: *date, value: Some(4.0) });
    }
    let data = MarketData::new(
        &PriceSeries::new(stocks),
        &PriceSeries::new(index),
        &PriceSeries::new(vix),
        YieldSeries::new(Maturity::TenYear, yields.clone()),
        YieldSeries::new(Maturity::TwoYear, yields),
        [("FLAT", "Utilities")].into_iter().collect(),
    )
    .unwrap();

    let table = FeatureEngine::new(&data).rolling(d(2023, 4, 28)).unwrap();
    assert!(!table.is_empty());
    for row in table.rows() {
        assert_abs_diff_eq!(row.alpha, 0.002, epsilon = 1e-12);
        assert_abs_diff_eq!(row.beta, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(row.index_avg, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(row.spread, 0.0, epsilon = 1e-15);
    }
}

#[test]
fn test_treasury_gaps_filled_before_windowing() {
    let anchor = d(2023, 3, 1);
    let mut scenario = Scenario::new(d(2023, 6, 30));
    let mut last_january = None;
    for obs in &mut scenario.t10 {
        if obs.date < d(2023, 2, 1) {
            last_january = obs.value;
        } else if obs.date < anchor {
            obs.value = None;
        }
    }
    let data = scenario.market();
    let table = FeatureEngine::new(&data).latest(anchor).unwrap();

    assert!(!table.is_empty());
    let carried = last_january.unwrap();
    for row in table.rows() {
        assert_abs_diff_eq!(row.eom_10yr, carried, epsilon = 1e-12);
        assert_abs_diff_eq!(row.avg_10yr, carried, epsilon = 1e-12);
    }
}

#[test]
fn test_round_trip_through_parquet() {
    let data = Scenario::new(d(2023, 6, 30)).market();
    let table = FeatureEngine::new(&data).rolling(d(2023, 6, 30)).unwrap();
    let path = std::env::temp_dir().join("hobart_rolling_round_trip.parquet");

    table.write_parquet(&path).unwrap();
    let loaded = FeatureTable::read_parquet(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, table);
}
