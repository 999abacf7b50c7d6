//! Timestamp utilities

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Timelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Get current local wall-clock time
pub fn now_local() -> DateTime<Local> {
    Local::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Render a wall-clock time on a 12-hour clock, e.g. `3:07:09 PM`.
///
/// The hour is not zero-padded; minutes and seconds always are. This is the
/// `hora` value stored on scanned records and sent to the backend.
pub fn clock_12h<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    let (is_pm, hour) = at.hour12();
    let suffix = if is_pm { "PM" } else { "AM" };
    format!("{}:{:02}:{:02} {}", hour, at.minute(), at.second(), suffix)
}

/// ISO-8601 timestamp with millisecond precision and a `Z` suffix
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
