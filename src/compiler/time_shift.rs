//! Time shift validation and the shifted time filters

use serde_json::{json, Map, Value};
use tracing::debug;
use super::error::{CompileError, TimeShiftErrorReason};
use crate::collection::ColumnCollection;
use crate::column::Column;
use crate::dsl::DEFAULT_TIME_FORMAT;
use crate::config::PipelineSettings;
use crate::operations::{definition, BucketBehavior, DslContext};
use crate::time::{ResolvedShift, TimeContext, TimeRange, TimeUnit};

/// Check every shifted metric against the smallest date histogram interval
/// and return the distinct shifts, ascending.
///
/// Without a date histogram in the request there is no interval to check
/// against. Calendar shifts (months and longer) count as multiples of any
/// interval that evenly divides a day, as long as every date histogram
/// buckets in UTC. Shifts that move the range past the supported dates are
/// rejected up front.
pub fn validate_time_shifts(
    ctx: &DslContext<'_>,
    columns: &[&Column],
) -> Result<Vec<ResolvedShift>, CompileError> {
    let shifted: Vec<&Column> = columns.iter().copied().filter(|c| c.has_time_shift()).collect();
    if shifted.is_empty() {
        return Ok(Vec::new());
    }
    let range = ctx.time.time_range.as_ref().ok_or(CompileError::MissingTimeRange)?;
    if ctx.time.primary_time_field().is_none() {
        return Err(CompileError::MissingTimeField);
    }

    let resolved: Vec<(&Column, ResolvedShift)> = shifted
        .iter()
        .filter_map(|c| Some((*c, c.time_shift?.resolve(Some(range))?)))
        .collect();
    for (_, shift) in &resolved {
        shifted_window(range, shift)?;
    }

    let buckets: Vec<(&Column, &BucketBehavior)> = columns
        .iter()
        .filter_map(|c| Some((*c, definition(c.operation_type()).bucket.as_ref()?)))
        .collect();
    let interval = buckets
        .iter()
        .filter_map(|(c, b)| (b.time_shift_interval_ms)(c, ctx))
        .filter(|ms| *ms > 0)
        .min();
    let calendar_aligned = buckets.iter().all(|(c, b)| (b.calendar_aligned)(c, ctx));

    if let Some(interval) = interval {
        let mut failures: Vec<(TimeShiftErrorReason, &str)> = Vec::new();
        for (column, shift) in &resolved {
            if let Some(reason) = check_shift(shift, interval, calendar_aligned) {
                failures.push((reason, column.id.as_str()));
            }
        }
        if let Some((reason, _)) = failures.first().copied() {
            let column_ids = failures
                .iter()
                .filter(|(r, _)| *r == reason)
                .map(|(_, id)| id.to_string())
                .collect();
            return Err(CompileError::InvalidTimeShift { reason, column_ids });
        }
    }

    let shifts = ctx.collection.time_shifts(Some(range));
    debug!(shifts = ?shifts.iter().map(|s| s.millis).collect::<Vec<_>>(), interval = ?interval, "Validated time shifts");
    Ok(shifts)
}

/// Calendar shifts move bucket keys by whole months, so they only line up
/// with buckets laid out in UTC whose width divides a day (or a month).
fn check_shift(shift: &ResolvedShift, interval_ms: i64, calendar_aligned: bool) -> Option<TimeShiftErrorReason> {
    if shift.millis < interval_ms {
        return Some(TimeShiftErrorReason::TooSmall);
    }
    let multiple = if shift.is_calendar() {
        calendar_aligned
            && (TimeUnit::Day.millis() % interval_ms == 0 || shift.millis % interval_ms == 0)
    } else {
        shift.millis % interval_ms == 0
    };
    if multiple {
        None
    } else {
        Some(TimeShiftErrorReason::NotAMultiple)
    }
}

fn shifted_window(range: &TimeRange, shift: &ResolvedShift) -> Result<TimeRange, CompileError> {
    range
        .shifted_back(shift)
        .ok_or_else(|| CompileError::ShiftOutOfRange { shift: shift.to_string() })
}

/// Range filter on `field` covering `range` moved back by `shift`
fn shifted_range(field: &str, range: &TimeRange, shift: &ResolvedShift, format: &str) -> Result<Value, CompileError> {
    let (gte, lte) = shifted_window(range, shift)?.bounds_iso();
    let mut bounds = Map::new();
    bounds.insert(field.to_string(), json!({ "gte": gte, "lte": lte, "format": format }));
    Ok(json!({ "range": bounds }))
}

fn time_format(settings: &PipelineSettings) -> &str {
    if settings.time_format.is_empty() {
        DEFAULT_TIME_FORMAT
    } else {
        settings.time_format.as_str()
    }
}

/// Range filter on the primary time field for the window `shift` back
pub(crate) fn shifted_time_filter(ctx: &DslContext<'_>, shift: &ResolvedShift) -> Result<Value, CompileError> {
    let range = ctx.time.time_range.as_ref().ok_or(CompileError::MissingTimeRange)?;
    let field = ctx.time.primary_time_field().ok_or(CompileError::MissingTimeField)?;
    shifted_range(field, range, shift, time_format(ctx.settings))
}

/// Body of the synthetic split: a filters aggregation with the unshifted
/// `"0"` branch followed by one branch per shift
pub(crate) fn split_body(ctx: &DslContext<'_>, shifts: &[ResolvedShift]) -> Result<Map<String, Value>, CompileError> {
    let range = ctx.time.time_range.as_ref().ok_or(CompileError::MissingTimeRange)?;
    let field = ctx.time.primary_time_field().ok_or(CompileError::MissingTimeField)?;
    let format = time_format(ctx.settings);

    let mut branches = Map::new();
    for shift in std::iter::once(&ResolvedShift::ZERO).chain(shifts.iter()) {
        branches.insert(shift.key(), shifted_range(field, range, shift, format)?);
    }
    let mut body = Map::new();
    body.insert("filters".into(), json!({ "filters": branches }));
    Ok(body)
}

/// The query-level time filter matching a compiled request.
///
/// Without shifts this is one range per time field. With shifts the
/// primary time field must match any of the shifted windows (the baseline
/// included). `None` when there is no time range or no time field.
pub fn search_time_filter(
    collection: &ColumnCollection,
    time: &TimeContext,
) -> Result<Option<Value>, CompileError> {
    let shifts = collection.time_shifts(time.time_range.as_ref());
    let Some(range) = time.time_range.as_ref() else {
        if collection.has_time_shifts() {
            return Err(CompileError::MissingTimeRange);
        }
        return Ok(None);
    };
    let format = time_format(collection.settings());

    if shifts.is_empty() {
        let mut ranges: Vec<Value> = time
            .time_fields
            .iter()
            .map(|field| shifted_range(field, range, &ResolvedShift::ZERO, format))
            .collect::<Result<_, _>>()?;
        return Ok(match ranges.len() {
            0 => None,
            1 => ranges.pop(),
            _ => Some(json!({ "bool": { "filter": ranges } })),
        });
    }

    let field = time.primary_time_field().ok_or(CompileError::MissingTimeField)?;
    let should: Vec<Value> = std::iter::once(&ResolvedShift::ZERO)
        .chain(shifts.iter())
        .map(|shift| shifted_range(field, range, shift, format))
        .collect::<Result<_, _>>()?;
    Ok(Some(json!({
        "bool": {
            "should": should,
            "minimum_should_match": 1
        }
    })))
}
