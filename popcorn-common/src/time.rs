//! Timestamp and calendar-day utilities
//!
//! All instants are UTC. Timestamps are stored in SQLite as
//! `YYYY-MM-DD HH:MM:SS` text so that lexical comparison matches
//! chronological order.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};

/// Storage format for timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC calendar day
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Midnight at the start of `date`
pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| NaiveDateTime::new(date, chrono::NaiveTime::MIN))
}

/// Midnight at the start of the day after `date`
///
/// Saturates at the last representable day instead of panicking.
pub fn next_day_start(date: NaiveDate) -> NaiveDateTime {
    day_start(date.checked_add_days(Days::new(1)).unwrap_or(date))
}

/// The `days` calendar days strictly before `today`, oldest first.
///
/// `trailing_window(2024-03-10, 3)` yields 03-07, 03-08, 03-09.
pub fn trailing_window(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (1..=u64::from(days))
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect()
}

/// First of the `days` calendar days strictly before `today`
///
/// Pair with an exclusive `< today` bound: the horizon is the same span
/// [`trailing_window`] walks.
pub fn horizon_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Format an instant for storage
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Format a calendar date for storage
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored calendar date
pub fn parse_date(s: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| crate::Error::InvalidInput(format!("Invalid date '{}': {}", s, e)))
}
