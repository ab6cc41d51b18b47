//! Calendar handling for reanalysis retrieval.
//!
//! Upstream sources cap the time window of a single request, so date ranges
//! are split into calendar-month chunks before fetching. CF time axes
//! (`<unit> since <epoch>`) are decoded here as well.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    #[error("Empty date range: {start} is not before {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("Unsupported CF time units: {0}")]
    UnsupportedUnits(String),

    #[error("Time value {0} is outside the representable range")]
    OutOfRange(f64),
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, TimeParseError> {
        if !(1..=12).contains(&month) {
            return Err(TimeParseError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> NaiveDate {
        // month is validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = TimeParseError;

    /// Parse `YYYY-MM` (a trailing `-DD` is tolerated and ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('-');
        let year = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?;
        let month = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?;
        Self::new(year, month)
    }
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TimeParseError> {
        if start >= end {
            return Err(TimeParseError::EmptyRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whole months from `start` through `end`, both inclusive.
    pub fn from_months(start: YearMonth, end: YearMonth) -> Result<Self, TimeParseError> {
        Self::new(start.first_day(), end.next().first_day())
    }

    /// Parse two `YYYY-MM-DD` dates.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn chunks(&self) -> Vec<MonthChunk> {
        month_chunks(self)
    }
}

/// One calendar-month-aligned piece of a [`DateRange`], `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthChunk {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthChunk {
    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.start)
    }

    /// Whether the chunk spans its whole calendar month.
    pub fn is_full_month(&self) -> bool {
        self.start.day() == 1 && self.end == self.month().next().first_day()
    }

    /// Days of the month covered by the chunk.
    pub fn days(&self) -> Vec<u32> {
        self.start
            .iter_days()
            .take_while(|d| *d < self.end)
            .map(|d| d.day())
            .collect()
    }

    pub fn start_datetime(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(chrono::NaiveTime::MIN))
    }

    pub fn end_datetime(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.end.and_time(chrono::NaiveTime::MIN))
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        *t >= self.start_datetime() && *t < self.end_datetime()
    }
}

impl fmt::Display for MonthChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.start, self.end)
    }
}

/// Split a range into calendar-month chunks.
///
/// The first chunk starts at `range.start` and the last one ends at
/// `range.end`, so either may be partial. Chunks never overlap and never
/// come out empty.
pub fn month_chunks(range: &DateRange) -> Vec<MonthChunk> {
    let mut chunks = Vec::new();
    let mut cur = range.start;

    while cur < range.end {
        let next = YearMonth::of(cur).next().first_day();
        let end = next.min(range.end);
        chunks.push(MonthChunk { start: cur, end });
        cur = next;
    }

    chunks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl CfUnit {
    fn seconds(&self) -> f64 {
        match self {
            CfUnit::Seconds => 1.0,
            CfUnit::Minutes => 60.0,
            CfUnit::Hours => 3600.0,
            CfUnit::Days => 86400.0,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CfUnit::Seconds => "seconds",
            CfUnit::Minutes => "minutes",
            CfUnit::Hours => "hours",
            CfUnit::Days => "days",
        }
    }
}

/// CF-convention time units, e.g. `hours since 1900-01-01 00:00:00.0`.
///
/// Only the standard/gregorian calendar is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    unit: CfUnit,
    epoch: DateTime<Utc>,
}

impl CfTimeUnits {
    /// `seconds since 1970-01-01 00:00:00`
    pub fn unix_seconds() -> Self {
        Self {
            unit: CfUnit::Seconds,
            epoch: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn parse(units: &str) -> Result<Self, TimeParseError> {
        let unsupported = || TimeParseError::UnsupportedUnits(units.to_string());

        let (unit_str, epoch_str) = units.trim().split_once(" since ").ok_or_else(unsupported)?;

        let unit = match unit_str.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => CfUnit::Seconds,
            "minutes" | "minute" | "mins" | "min" => CfUnit::Minutes,
            "hours" | "hour" | "hrs" | "hr" | "h" => CfUnit::Hours,
            "days" | "day" | "d" => CfUnit::Days,
            _ => return Err(unsupported()),
        };

        let epoch = parse_epoch(epoch_str.trim()).ok_or_else(unsupported)?;
        Ok(Self { unit, epoch })
    }

    /// Timestamp of an axis value. Non-finite values and offsets beyond the
    /// calendar range (e.g. an unwritten slot holding the NetCDF default
    /// fill) are errors.
    pub fn decode(&self, value: f64) -> Result<DateTime<Utc>, TimeParseError> {
        let out_of_range = || TimeParseError::OutOfRange(value);

        let millis = (value * self.unit.seconds() * 1000.0).round();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return Err(out_of_range());
        }
        let offset = Duration::try_milliseconds(millis as i64).ok_or_else(out_of_range)?;
        self.epoch.checked_add_signed(offset).ok_or_else(out_of_range)
    }

    pub fn encode(&self, t: &DateTime<Utc>) -> f64 {
        (*t - self.epoch).num_milliseconds() as f64 / 1000.0 / self.unit.seconds()
    }
}

impl fmt::Display for CfTimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} since {}",
            self.unit.name(),
            self.epoch.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    // Trailing zone designators: "Z", "UTC", "+00:00"
    let s = s
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim();

    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN)))
}
