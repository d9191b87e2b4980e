//! Quarter-hour alignment for trading windows.
//!
//! Trading windows start on a quarter-hour boundary (minute 00, 15, 30 or 45).
//! Alignment always moves *strictly forward*: a timestamp already sitting on a
//! boundary rolls to the next one, so `00:00:00` becomes `00:15:00`.
//!
//! Everything here is UTC. Zone-less timestamps (`NaiveDateTime`) are read as
//! UTC, never as local time.

use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};

/// Length of one quarter-hour in milliseconds.
pub const QUARTER_HOUR_MS: i64 = 15 * 60 * 1000;

/// Align `ts` forward to the next quarter-hour boundary.
///
/// - minute in 0..45: same hour, smallest boundary strictly greater than the minute
/// - minute in 45..60: start of the next hour (rolls day/month/year as needed)
///
/// Seconds and sub-seconds are always zeroed.
///
/// Inside the last quarter-hour chrono can represent there is no next
/// boundary; the result then saturates at [`DateTime::<Utc>::MAX_UTC`]. Use
/// [`checked_align_to_next_quarter`] to detect that case.
pub fn align_to_next_quarter(ts: DateTime<Utc>) -> DateTime<Utc> {
    checked_align_to_next_quarter(ts).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// [`align_to_next_quarter`], or `None` when the next boundary is past chrono's range.
pub fn checked_align_to_next_quarter(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let minute = ts.minute();
    // Floor to the current quarter; with_* on Utc only fails on invalid field values.
    let floored = ts
        .with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_minute(minute - minute % 15))
        .unwrap_or(ts);
    floored.checked_add_signed(TimeDelta::milliseconds(QUARTER_HOUR_MS))
}

/// Same as [`align_to_next_quarter`] for a zone-less timestamp, read as UTC.
pub fn align_naive_to_next_quarter(ts: NaiveDateTime) -> DateTime<Utc> {
    align_to_next_quarter(ts.and_utc())
}

/// Milliseconds since the Unix epoch.
pub fn to_epoch_millis<Tz: TimeZone>(ts: &DateTime<Tz>) -> i64 {
    ts.timestamp_millis()
}

/// Milliseconds since the Unix epoch for a zone-less timestamp, read as UTC.
pub fn naive_to_epoch_millis(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

/// `None` when `ms` falls outside the range chrono can represent.
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Epoch-millisecond form of [`align_to_next_quarter`].
///
/// `None` when `ms` or its aligned value falls outside chrono's range.
pub fn align_millis(ms: i64) -> Option<i64> {
    from_epoch_millis(ms)
        .and_then(checked_align_to_next_quarter)
        .map(|ts| to_epoch_millis(&ts))
}

/// True when `ms` sits exactly on a quarter-hour boundary.
pub fn is_quarter_aligned(ms: i64) -> bool {
    ms.rem_euclid(QUARTER_HOUR_MS) == 0
}
