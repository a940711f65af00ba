//! Date, time and timestamp values.
//!
//! All three are thin wrappers over integer offsets from the Unix epoch (or
//! from midnight), with ISO-8601 rendering and parsing. Calendar arithmetic
//! uses Howard Hinnant's civil date algorithms.

use std::fmt;

use crate::error::{CursorError, Result};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_DAY: i64 = 86_400 * NANOS_PER_SECOND;

/// Calendar date as days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    days: i32,
}

impl Date {
    #[must_use]
    pub const fn from_days(days: i32) -> Self {
        Self { days }
    }

    /// Build from a proleptic Gregorian year, month (1-12) and day (1-31).
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return Err(CursorError::decode(format!(
                "invalid date: {year:04}-{month:02}-{day:02}"
            )));
        }
        Ok(Self::from_days(days_from_ymd(year, month, day)))
    }

    /// Parse `YYYY-MM-DD`.
    pub fn parse_iso(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(3, '-');
        let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CursorError::decode(format!("invalid date format: {s}")));
        };
        let year = y
            .parse()
            .map_err(|_| CursorError::decode(format!("invalid year in: {s}")))?;
        let month = m
            .parse()
            .map_err(|_| CursorError::decode(format!("invalid month in: {s}")))?;
        let day = d
            .parse()
            .map_err(|_| CursorError::decode(format!("invalid day in: {s}")))?;
        Self::from_ymd(year, month, day)
    }

    #[must_use]
    pub const fn days_since_epoch(self) -> i32 {
        self.days
    }

    /// `(year, month, day)` of this date.
    #[must_use]
    pub const fn ymd(self) -> (i32, u32, u32) {
        civil_from_days(self.days)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (y, m, d) = self.ymd();
        write!(f, "{y:04}-{m:02}-{d:02}")
    }
}

/// Time of day as nanoseconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    nanos: i64,
}

impl Time {
    /// Build from nanoseconds since midnight; must be within one day.
    pub fn from_nanos(nanos: i64) -> Result<Self> {
        if !(0..NANOS_PER_DAY).contains(&nanos) {
            return Err(CursorError::decode(format!(
                "time of day out of range: {nanos}ns"
            )));
        }
        Ok(Self { nanos })
    }

    /// Parse `HH:MM:SS[.fffffffff]`.
    pub fn parse_iso(s: &str) -> Result<Self> {
        let s = s.trim();
        let (hms, fraction) = s.split_once('.').unwrap_or((s, ""));
        let parts: Vec<&str> = hms.split(':').collect();
        if parts.len() != 3 {
            return Err(CursorError::decode(format!("invalid time format: {s}")));
        }
        let mut total: i64 = 0;
        for (part, limit) in parts.iter().zip([24, 60, 60]) {
            let value: i64 = part
                .parse()
                .map_err(|_| CursorError::decode(format!("invalid time component in: {s}")))?;
            if !(0..limit).contains(&value) {
                return Err(CursorError::decode(format!("time component out of range: {s}")));
            }
            total = total * 60 + value;
        }
        Self::from_nanos(total * NANOS_PER_SECOND + parse_fraction(fraction, s)?)
    }

    #[must_use]
    pub const fn nanos_since_midnight(self) -> i64 {
        self.nanos
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_time_of_day(f, self.nanos)
    }
}

/// Instant as nanoseconds since 1970-01-01T00:00:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    nanos: i64,
}

impl Timestamp {
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Parse `YYYY-MM-DD[ T]HH:MM:SS[.fffffffff]`.
    pub fn parse_iso(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((date, time)) = s.split_once([' ', 'T']) else {
            return Err(CursorError::decode(format!("invalid timestamp format: {s}")));
        };
        let date = Date::parse_iso(date)?;
        let time = Time::parse_iso(time)?;
        i64::from(date.days_since_epoch())
            .checked_mul(NANOS_PER_DAY)
            .and_then(|n| n.checked_add(time.nanos_since_midnight()))
            .map(Self::from_nanos)
            .ok_or_else(|| CursorError::decode(format!("timestamp out of range: {s}")))
    }

    #[must_use]
    pub const fn nanos_since_epoch(self) -> i64 {
        self.nanos
    }

    /// Calendar date part.
    #[must_use]
    pub const fn date(self) -> Date {
        Date::from_days(self.nanos.div_euclid(NANOS_PER_DAY) as i32)
    }

    /// Time-of-day part.
    #[must_use]
    pub const fn time(self) -> Time {
        Time {
            nanos: self.nanos.rem_euclid(NANOS_PER_DAY),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.date())?;
        write_time_of_day(f, self.time().nanos)
    }
}

/// Parse `[-]seconds[.fraction]` into nanoseconds, as the row-oriented text
/// layout encodes times and timestamps.
pub fn parse_epoch_seconds(s: &str) -> Result<i64> {
    let s = s.trim();
    let (negative, unsigned) = s
        .strip_prefix('-')
        .map_or((false, s), |rest| (true, rest));
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let whole: i64 = whole
        .parse()
        .map_err(|_| CursorError::decode(format!("invalid epoch value: {s}")))?;
    let nanos = whole
        .checked_mul(NANOS_PER_SECOND)
        .and_then(|n| n.checked_add(parse_fraction(fraction, s).ok()?))
        .ok_or_else(|| CursorError::decode(format!("epoch value out of range: {s}")))?;
    Ok(if negative { -nanos } else { nanos })
}

fn parse_fraction(fraction: &str, original: &str) -> Result<i64> {
    if fraction.is_empty() {
        return Ok(0);
    }
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CursorError::decode(format!(
            "invalid fractional seconds in: {original}"
        )));
    }
    let digits: i64 = fraction
        .parse()
        .map_err(|_| CursorError::decode(format!("invalid fractional seconds in: {original}")))?;
    Ok(digits * 10_i64.pow(9 - fraction.len() as u32))
}

fn write_time_of_day(f: &mut fmt::Formatter<'_>, nanos: i64) -> fmt::Result {
    let secs = nanos / NANOS_PER_SECOND;
    let sub = nanos % NANOS_PER_SECOND;
    write!(
        f,
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )?;
    if sub != 0 {
        let digits = format!("{sub:09}");
        write!(f, ".{}", digits.trim_end_matches('0'))?;
    }
    Ok(())
}

const fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

const fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since the Unix epoch for a civil date.
const fn days_from_ymd(year: i32, month: u32, day: u32) -> i32 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe as i32 - 719_468
}

/// Civil date for a count of days since the Unix epoch.
const fn civil_from_days(days: i32) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i32 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}
