// Calendar bucketing of record timestamps in the observer's time zone.
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Number of days in the trend window, today included.
pub const WEEK_DAYS: usize = 7;

/// Convert epoch milliseconds into the observer's zone. Out-of-range
/// timestamps yield `None` and simply fall out of every date bucket.
pub fn local_datetime<Tz: TimeZone>(ts_ms: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .map(|utc| utc.with_timezone(tz))
}

pub fn day_key<Tz: TimeZone>(ts_ms: i64, tz: &Tz) -> Option<NaiveDate> {
    local_datetime(ts_ms, tz).map(|dt| dt.date_naive())
}

/// `(year, month)` with a 1-based month.
pub fn month_key<Tz: TimeZone>(ts_ms: i64, tz: &Tz) -> Option<(i32, u32)> {
    local_datetime(ts_ms, tz).map(|dt| (dt.year(), dt.month()))
}

/// Year, month and day-of-month all match `now`'s local date.
pub fn is_same_day<Tz: TimeZone>(ts_ms: i64, now: &DateTime<Tz>) -> bool {
    day_key(ts_ms, &now.timezone()) == Some(now.date_naive())
}

/// The seven calendar days ending on `today`, oldest first.
pub fn trailing_week(today: NaiveDate) -> [NaiveDate; WEEK_DAYS] {
    std::array::from_fn(|i| today - Duration::days((WEEK_DAYS - 1 - i) as i64))
}

/// Short weekday name, e.g. `Mon`.
pub fn weekday_label(date: NaiveDate) -> String {
    date.format("%a").to_string()
}
