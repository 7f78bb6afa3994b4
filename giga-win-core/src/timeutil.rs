//! Helpers for the second-granular wall-clock times the WIN format and the
//! HYPOMH text files work in. All instants are naive; the format carries no
//! zone information.
use chrono::{Duration, NaiveDateTime, Timelike};

use crate::errors::WinError;

/// Expand a two-digit year the way HYPOMH does.
///
/// ```
/// # use giga_win_core::timeutil::yy2yyyy;
/// assert_eq!(yy2yyyy(99).unwrap(), 1999);
/// assert_eq!(yy2yyyy(70).unwrap(), 1970);
/// assert_eq!(yy2yyyy(69).unwrap(), 2069);
/// assert_eq!(yy2yyyy(0).unwrap(), 2000);
/// ```
pub fn yy2yyyy(yy: i32) -> Result<i32, WinError> {
    match yy {
        70..=99 => Ok(1900 + yy),
        0..=69 => Ok(2000 + yy),
        _ => Err(WinError::OutOfRange {
            msg: format!("yy is out of expected range 0..=99: {}", yy),
        }),
    }
}

/// Reduce a full year to the two digits stored on the wire. Only years the
/// expansion can reproduce are representable.
pub fn yyyy2yy(year: i32) -> Result<u8, WinError> {
    if !(1970..=2069).contains(&year) {
        return Err(WinError::OutOfRange {
            msg: format!("year {} is outside the representable 1970..=2069", year),
        });
    }
    Ok((year % 100) as u8)
}

/// The time vector of `n` samples at `fs` Hz starting at `start`. Each
/// instant is derived from the start independently so that long records do
/// not accumulate rounding drift.
pub fn sample_times(start: NaiveDateTime, fs: f64, n: usize) -> Vec<NaiveDateTime> {
    (0..n)
        .map(|i| start + Duration::nanoseconds((i as f64 * 1e9 / fs).round() as i64))
        .collect()
}

/// The latest whole second at or before `t`.
pub fn floor_second(t: NaiveDateTime) -> NaiveDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// The earliest whole second at or after `t`.
pub fn ceil_second(t: NaiveDateTime) -> NaiveDateTime {
    if t.nanosecond() == 0 {
        t
    } else {
        floor_second(t) + Duration::seconds(1)
    }
}

/// Seconds between two instants as a float.
pub fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let d = to - from;
    d.num_nanoseconds()
        .map(|ns| ns as f64 / 1e9)
        .unwrap_or_else(|| d.num_seconds() as f64)
}

/// A duration of `secs` seconds, kept at nanosecond resolution.
pub fn duration_secs(secs: f64) -> Duration {
    Duration::nanoseconds((secs * 1e9).round() as i64)
}
