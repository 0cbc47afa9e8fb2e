//! Time ranges and the explicit time context

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use super::shift::ResolvedShift;

/// An absolute time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Parse a range from two RFC 3339 timestamps
    pub fn parse(from: &str, to: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self {
            from: DateTime::parse_from_rfc3339(from)?.with_timezone(&Utc),
            to: DateTime::parse_from_rfc3339(to)?.with_timezone(&Utc),
        })
    }

    pub fn duration_ms(&self) -> i64 {
        (self.to - self.from).num_milliseconds()
    }

    /// Move both ends back by `shift`. Month-based units move by calendar
    /// months, everything else by a fixed number of milliseconds. `None`
    /// when either end leaves the representable date range.
    pub fn shifted_back(&self, shift: &ResolvedShift) -> Option<TimeRange> {
        if shift.is_zero() {
            return Some(*self);
        }
        Some(TimeRange {
            from: shift.back(self.from)?,
            to: shift.back(self.to)?,
        })
    }

    /// ISO timestamps with millisecond precision, as the engine expects them
    pub fn bounds_iso(&self) -> (String, String) {
        (
            self.from.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.to.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

/// Temporal context for one compile-and-fetch cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeContext {
    pub time_range: Option<TimeRange>,
    /// Fields the global time filter applies to; the first one carries
    /// shifted branch filters
    pub time_fields: Vec<String>,
}

impl TimeContext {
    pub fn new(time_range: TimeRange, time_fields: Vec<String>) -> Self {
        Self {
            time_range: Some(time_range),
            time_fields,
        }
    }

    pub fn primary_time_field(&self) -> Option<&str> {
        self.time_fields.first().map(|s| s.as_str())
    }

    pub fn is_time_field(&self, name: &str) -> bool {
        self.time_fields.iter().any(|f| f == name)
    }
}
