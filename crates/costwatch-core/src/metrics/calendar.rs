//! Calendar arithmetic for billing windows

use chrono::{Datelike, Duration, NaiveDate};

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

/// Number of days in the month containing `date`
pub fn days_in_month(date: NaiveDate) -> u32 {
    let start = month_start(date);
    let next = month_start(start + Duration::days(32));
    (next - start).num_days() as u32
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Complete days of the month before `as_of`
pub fn days_elapsed(as_of: NaiveDate) -> u32 {
    (as_of - month_start(as_of)).num_days() as u32
}

/// Iterate `[start, end)` day by day
pub fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let count = (end - start).num_days().max(0);
    (0..count).map(move |offset| start + Duration::days(offset))
}
