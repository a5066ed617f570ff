//! New York market calendar helpers used to pick download bounds.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Timelike, Utc, Weekday};

/// Hour (New York local) after which the current day's close is final.
pub const MARKET_CLOSE_HOUR: u32 = 16;

/// Last date with a final close: today in New York once the market has
/// closed, otherwise yesterday.
pub fn market_close_date(now: DateTime<Utc>) -> NaiveDate {
    let local = now + Duration::hours(eastern_offset_hours(now));
    let today = local.date_naive();
    if local.hour() >= MARKET_CLOSE_HOUR {
        today
    } else {
        today.pred_opt().unwrap_or(today)
    }
}

/// First day of the month `span_years` before `date`.
pub fn history_start(date: NaiveDate, span_years: u32) -> NaiveDate {
    let shifted = date
        .checked_sub_months(Months::new(span_years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN);
    shifted.with_day(1).unwrap_or(shifted)
}

/// UTC offset of US Eastern time at `now`, in hours.
///
/// Daylight time runs from 02:00 local on the second Sunday of March to
/// 02:00 local on the first Sunday of November.
pub fn eastern_offset_hours(now: DateTime<Utc>) -> i64 {
    let year = now.year();
    let (Some(march), Some(november)) = (
        nth_sunday(year, 3, 2).and_then(|d| d.and_hms_opt(7, 0, 0)),
        nth_sunday(year, 11, 1).and_then(|d| d.and_hms_opt(6, 0, 0)),
    ) else {
        return -5;
    };
    let utc = now.naive_utc();
    if utc >= march && utc < november { -4 } else { -5 }
}

fn nth_sunday(year: i32, month: u32, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 - first.weekday().num_days_from_sunday()) % 7;
    first.checked_add_signed(Duration::days(i64::from(offset + 7 * (n - 1))))
        .filter(|d| d.weekday() == Weekday::Sun)
}
