//! Time shift durations
//!
//! Shifts are written as `<amount><unit>` (`1d`, `12h`, `3M`) or as the
//! keyword `previous`, meaning "one time-range length back".

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use super::range::TimeRange;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;
/// Average month length (365.2425 days / 12)
const MONTH_MS: i64 = 2_629_746_000;
/// Average year length (365.2425 days)
const YEAR_MS: i64 = 31_556_952_000;

/// Units accepted in shifts and intervals. Case matters: `m` is minutes,
/// `M` is months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Millisecond => "ms",
            TimeUnit::Second => "s",
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
            TimeUnit::Week => "w",
            TimeUnit::Month => "M",
            TimeUnit::Quarter => "q",
            TimeUnit::Year => "y",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "ms" => TimeUnit::Millisecond,
            "s" => TimeUnit::Second,
            "m" => TimeUnit::Minute,
            "h" => TimeUnit::Hour,
            "d" => TimeUnit::Day,
            "w" => TimeUnit::Week,
            "M" => TimeUnit::Month,
            "q" => TimeUnit::Quarter,
            "y" => TimeUnit::Year,
            _ => return None,
        })
    }

    /// Length of one unit in milliseconds (averaged for calendar units)
    pub fn millis(&self) -> i64 {
        match self {
            TimeUnit::Millisecond => 1,
            TimeUnit::Second => SECOND_MS,
            TimeUnit::Minute => MINUTE_MS,
            TimeUnit::Hour => HOUR_MS,
            TimeUnit::Day => DAY_MS,
            TimeUnit::Week => WEEK_MS,
            TimeUnit::Month => MONTH_MS,
            TimeUnit::Quarter => 3 * MONTH_MS,
            TimeUnit::Year => YEAR_MS,
        }
    }

    /// Months per unit for units whose length varies with the calendar
    pub fn calendar_months(&self) -> Option<u32> {
        match self {
            TimeUnit::Month => Some(1),
            TimeUnit::Quarter => Some(3),
            TimeUnit::Year => Some(12),
            _ => None,
        }
    }
}

/// Split `"12h"` into `(12, Hour)`
pub(crate) fn split_amount_unit(input: &str) -> Option<(u32, TimeUnit)> {
    let input = input.trim();
    let digits_end = input
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let (num, unit) = input.split_at(digits_end);
    let unit = TimeUnit::from_suffix(unit.trim())?;
    let amount = if num.is_empty() { 1 } else { num.parse().ok()? };
    Some((amount, unit))
}

/// A fixed shift such as `7d`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShiftDuration {
    pub amount: u32,
    pub unit: TimeUnit,
}

impl ShiftDuration {
    pub fn new(amount: u32, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// Length in milliseconds, saturating at `i64::MAX`
    pub fn as_millis(&self) -> i64 {
        self.checked_millis().unwrap_or(i64::MAX)
    }

    pub fn checked_millis(&self) -> Option<i64> {
        i64::from(self.amount).checked_mul(self.unit.millis())
    }

    /// Whole calendar months for month-based units
    pub fn calendar_months(&self) -> Option<u32> {
        self.unit.calendar_months()?.checked_mul(self.amount)
    }
}

impl fmt::Display for ShiftDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// Error when parsing a time shift string
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid time shift '{input}': expected '<amount><unit>' (units s, m, h, d, w, M, y) or 'previous'")]
pub struct ParseTimeShiftError {
    pub input: String,
}

/// A per-metric time shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeShift {
    Duration(ShiftDuration),
    /// Shift back by the length of the active time range
    Previous,
}

impl TimeShift {
    /// Parse an optional shift. Empty strings and zero-length shifts mean
    /// "no shift".
    pub fn parse_optional(input: &str) -> Result<Option<TimeShift>, ParseTimeShiftError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let shift: TimeShift = trimmed.parse()?;
        match shift {
            TimeShift::Duration(d) if d.amount == 0 => Ok(None),
            other => Ok(Some(other)),
        }
    }

    /// Resolve to milliseconds. `Previous` needs the active time range.
    pub fn resolve(&self, range: Option<&TimeRange>) -> Option<ResolvedShift> {
        match self {
            TimeShift::Duration(d) => Some(ResolvedShift {
                millis: d.as_millis(),
                duration: Some(*d),
            }),
            TimeShift::Previous => range.map(|r| ResolvedShift {
                millis: r.duration_ms(),
                duration: None,
            }),
        }
    }
}

impl fmt::Display for TimeShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeShift::Duration(d) => write!(f, "{}", d),
            TimeShift::Previous => f.write_str("previous"),
        }
    }
}

impl FromStr for TimeShift {
    type Err = ParseTimeShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "previous" {
            return Ok(TimeShift::Previous);
        }
        let err = || ParseTimeShiftError { input: s.to_string() };
        // Shifts always carry an explicit amount
        if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(err());
        }
        let (amount, unit) = split_amount_unit(trimmed).ok_or_else(err)?;
        if matches!(unit, TimeUnit::Millisecond | TimeUnit::Quarter) {
            return Err(err());
        }
        let duration = ShiftDuration::new(amount, unit);
        let overflows = duration.checked_millis().is_none()
            || (unit.calendar_months().is_some() && duration.calendar_months().is_none());
        if overflows {
            return Err(err());
        }
        Ok(TimeShift::Duration(duration))
    }
}

impl<'de> Deserialize<'de> for TimeShift {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TimeShift::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for TimeShift {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A shift resolved against a concrete time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedShift {
    pub millis: i64,
    /// The written duration, kept so calendar units shift by calendar months
    pub duration: Option<ShiftDuration>,
}

impl ResolvedShift {
    /// The unshifted baseline
    pub const ZERO: ResolvedShift = ResolvedShift { millis: 0, duration: None };

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    /// Branch key and doc-count suffix: the shift in milliseconds
    pub fn key(&self) -> String {
        self.millis.to_string()
    }

    /// Whether this shift moves by calendar months rather than a fixed
    /// length
    pub fn is_calendar(&self) -> bool {
        self.duration.is_some_and(|d| d.unit.calendar_months().is_some())
    }

    /// `t` moved back by this shift. `None` when the result leaves the
    /// representable date range.
    pub fn back(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.months()? {
            Some(months) => t.checked_sub_months(months),
            None => t.checked_sub_signed(Duration::try_milliseconds(self.millis)?),
        }
    }

    /// Inverse of [`ResolvedShift::back`]
    pub fn forward(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.months()? {
            Some(months) => t.checked_add_months(months),
            None => t.checked_add_signed(Duration::try_milliseconds(self.millis)?),
        }
    }

    /// Outer `None` when a month-based shift has too many months
    fn months(&self) -> Option<Option<Months>> {
        match self.duration {
            Some(d) if d.unit.calendar_months().is_some() => Some(Some(Months::new(d.calendar_months()?))),
            _ => Some(None),
        }
    }
}

impl fmt::Display for ResolvedShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration {
            Some(d) => write!(f, "{}", d),
            None => write!(f, "{}ms", self.millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(
            "1d".parse::<TimeShift>().unwrap(),
            TimeShift::Duration(ShiftDuration::new(1, TimeUnit::Day))
        );
        assert_eq!(
            "3M".parse::<TimeShift>().unwrap(),
            TimeShift::Duration(ShiftDuration::new(3, TimeUnit::Month))
        );
        assert_eq!(
            "15m".parse::<TimeShift>().unwrap(),
            TimeShift::Duration(ShiftDuration::new(15, TimeUnit::Minute))
        );
        assert_eq!("previous".parse::<TimeShift>().unwrap(), TimeShift::Previous);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("d".parse::<TimeShift>().is_err());
        assert!("1x".parse::<TimeShift>().is_err());
        assert!("-1d".parse::<TimeShift>().is_err());
        assert!("10ms".parse::<TimeShift>().is_err());
    }

    #[test]
    fn test_zero_and_empty_mean_no_shift() {
        assert_eq!(TimeShift::parse_optional("").unwrap(), None);
        assert_eq!(TimeShift::parse_optional("0d").unwrap(), None);
        assert!(TimeShift::parse_optional("2w").unwrap().is_some());
    }

    #[test]
    fn test_millis() {
        assert_eq!(ShiftDuration::new(1, TimeUnit::Day).as_millis(), 86_400_000);
        assert_eq!(ShiftDuration::new(2, TimeUnit::Day).as_millis(), 172_800_000);
        assert_eq!(ShiftDuration::new(1, TimeUnit::Month).as_millis(), 2_629_746_000);
    }

    #[test]
    fn test_parse_rejects_overflowing_amounts() {
        assert!("4294967295y".parse::<TimeShift>().is_err());
        assert!("99999999999d".parse::<TimeShift>().is_err());
        // Fits in milliseconds, so it parses; range checks happen on use
        assert!("300000y".parse::<TimeShift>().is_ok());
    }

    #[test]
    fn test_calendar_shift_moves_by_months() {
        let d = ShiftDuration::new(1, TimeUnit::Month);
        let shift = ResolvedShift { millis: d.as_millis(), duration: Some(d) };
        let feb = DateTime::parse_from_rfc3339("2024-02-04T00:00:00Z").unwrap().with_timezone(&Utc);
        let mar = DateTime::parse_from_rfc3339("2024-03-04T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(shift.back(mar), Some(feb));
        assert_eq!(shift.forward(feb), Some(mar));
        assert!(shift.is_calendar());
        assert_eq!(shift.to_string(), "1M");
    }

    #[test]
    fn test_out_of_range_shift_is_none() {
        let d = ShiftDuration::new(300_000, TimeUnit::Year);
        let shift = ResolvedShift { millis: d.as_millis(), duration: Some(d) };
        let now = DateTime::parse_from_rfc3339("2024-03-04T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(shift.back(now), None);
        let fixed = ResolvedShift { millis: i64::MAX, duration: None };
        assert_eq!(fixed.back(now), None);
    }

    #[test]
    fn test_previous_needs_range() {
        assert!(TimeShift::Previous.resolve(None).is_none());
        let range = TimeRange::parse("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z").unwrap();
        let resolved = TimeShift::Previous.resolve(Some(&range)).unwrap();
        assert_eq!(resolved.millis, 86_400_000);
        assert_eq!(resolved.key(), "86400000");
    }
}
