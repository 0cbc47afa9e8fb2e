//! Date histogram intervals and auto-interval selection

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use super::range::TimeRange;
use super::shift::{split_amount_unit, TimeUnit};

/// "Nice" intervals an `auto` date histogram snaps to
const STANDARD_INTERVALS: &[(u32, TimeUnit)] = &[
    (1, TimeUnit::Second),
    (10, TimeUnit::Second),
    (30, TimeUnit::Second),
    (1, TimeUnit::Minute),
    (5, TimeUnit::Minute),
    (10, TimeUnit::Minute),
    (30, TimeUnit::Minute),
    (1, TimeUnit::Hour),
    (3, TimeUnit::Hour),
    (12, TimeUnit::Hour),
    (1, TimeUnit::Day),
    (1, TimeUnit::Week),
    (1, TimeUnit::Month),
    (1, TimeUnit::Year),
];

/// Error when parsing a date interval string
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid date interval '{input}': {message}")]
pub struct ParseIntervalError {
    pub input: String,
    pub message: String,
}

/// A date histogram interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInterval {
    /// Pick from the time range
    Auto,
    /// Fixed-length buckets (`30s`, `12h`, `2d`)
    Fixed { amount: u32, unit: TimeUnit },
    /// Calendar-aware single-unit buckets (`1w`, `1M`, `1q`, `1y`)
    Calendar(TimeUnit),
}

impl DateInterval {
    /// Replace `Auto` with a concrete interval. Without bounds `auto`
    /// becomes one day.
    pub fn resolve(&self, bounds: Option<&TimeRange>, bar_target: u32) -> DateInterval {
        match self {
            DateInterval::Auto => match bounds {
                Some(range) => auto_interval(range, bar_target),
                None => DateInterval::Fixed { amount: 1, unit: TimeUnit::Day },
            },
            other => *other,
        }
    }

    /// Approximate bucket length; `None` for `Auto`
    pub fn as_millis(&self) -> Option<i64> {
        match self {
            DateInterval::Auto => None,
            DateInterval::Fixed { amount, unit } => Some(i64::from(*amount).saturating_mul(unit.millis())),
            DateInterval::Calendar(unit) => Some(unit.millis()),
        }
    }

    /// Write the interval keys into a `date_histogram` clause
    pub fn write_dsl(&self, clause: &mut Map<String, Value>) {
        match self {
            DateInterval::Fixed { .. } => {
                clause.insert("fixed_interval".into(), Value::String(self.to_string()));
            }
            DateInterval::Calendar(_) => {
                clause.insert("calendar_interval".into(), Value::String(self.to_string()));
            }
            DateInterval::Auto => {}
        }
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateInterval::Auto => f.write_str("auto"),
            DateInterval::Fixed { amount, unit } => write!(f, "{}{}", amount, unit.suffix()),
            DateInterval::Calendar(unit) => write!(f, "1{}", unit.suffix()),
        }
    }
}

impl FromStr for DateInterval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "auto" {
            return Ok(DateInterval::Auto);
        }
        let err = |message: &str| ParseIntervalError {
            input: s.to_string(),
            message: message.to_string(),
        };
        let (amount, unit) = split_amount_unit(trimmed).ok_or_else(|| err("unknown unit"))?;
        if amount == 0 {
            return Err(err("interval must be positive"));
        }
        match unit {
            TimeUnit::Week if amount == 1 => Ok(DateInterval::Calendar(unit)),
            // Multi-week intervals have a fixed length
            TimeUnit::Week => amount
                .checked_mul(7)
                .map(|days| DateInterval::Fixed { amount: days, unit: TimeUnit::Day })
                .ok_or_else(|| err("interval too large")),
            TimeUnit::Month | TimeUnit::Quarter | TimeUnit::Year if amount == 1 => {
                Ok(DateInterval::Calendar(unit))
            }
            TimeUnit::Month | TimeUnit::Quarter | TimeUnit::Year => {
                Err(err("calendar intervals only support a single unit"))
            }
            _ => Ok(DateInterval::Fixed { amount, unit }),
        }
    }
}

impl<'de> Deserialize<'de> for DateInterval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateInterval::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for DateInterval {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Choose the standard interval closest to `range / bar_target`
pub fn auto_interval(range: &TimeRange, bar_target: u32) -> DateInterval {
    let span = range.duration_ms();
    if span <= 0 || bar_target == 0 {
        return DateInterval::Fixed { amount: 1, unit: TimeUnit::Minute };
    }
    let ideal = span / i64::from(bar_target);

    let mut best = STANDARD_INTERVALS[0];
    let mut min_diff = i64::MAX;
    for &(amount, unit) in STANDARD_INTERVALS {
        let diff = (i64::from(amount) * unit.millis() - ideal).abs();
        if diff < min_diff {
            min_diff = diff;
            best = (amount, unit);
        }
    }

    match best {
        (1, unit @ (TimeUnit::Week | TimeUnit::Month | TimeUnit::Year)) => DateInterval::Calendar(unit),
        (amount, unit) => DateInterval::Fixed { amount, unit },
    }
}
