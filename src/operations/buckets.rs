//! Bucket operations: terms, date histogram, histogram, range, filters

use chrono::DateTime;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use crate::collection::{CollectionError, ColumnCollection};
use crate::column::{
    Column, DateHistogramParams, FiltersParams, HistogramParams, OperationParams, RangeParams,
    RangeSpec, SortDirection, TermsOrderBy, TermsParams,
};
use crate::compiler::{shifted_time_filter, split_position, CompileError};
use crate::data_view::{DataView, Field, FieldType};
use crate::dsl::AggFragment;
use crate::time::{DateInterval, ResolvedShift, TimeContext};
use super::context::{BuildColumnArgs, DslContext};
use super::metrics;
use super::registry::definition;

// ---- shared ----

pub(super) fn field_label(column: &Column) -> String {
    match column.field() {
        Some(field) => field.to_string(),
        None => definition(column.operation_type()).display_name.to_string(),
    }
}

pub(super) fn never_splits(_column: &Column, _time: &TimeContext) -> bool {
    false
}

pub(super) fn no_interval(_column: &Column, _ctx: &DslContext<'_>) -> Option<i64> {
    None
}

pub(super) fn always_aligned(_column: &Column, _ctx: &DslContext<'_>) -> bool {
    true
}

pub(super) fn same_key(key: &Value, _shift: &ResolvedShift) -> Value {
    key.clone()
}

/// Numbers before strings, numbers numerically, strings lexically
pub(crate) fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn bucket_key(bucket: &Value) -> &Value {
    bucket.get("key").unwrap_or(&Value::Null)
}

pub(super) fn key_order(
    _column: &Column,
    _collection: &ColumnCollection,
    a: (&str, &Value),
    b: (&str, &Value),
) -> Ordering {
    compare_keys(bucket_key(a.1), bucket_key(b.1))
}

// ---- terms ----

pub(super) fn terms_applies(field: &Field) -> bool {
    matches!(
        field.field_type,
        FieldType::String | FieldType::Number | FieldType::Ip | FieldType::Boolean
    ) && field.aggregatable
}

pub(super) fn terms_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let field = args.require_field()?;
    let sort_by = args
        .collection
        .columns()
        .find(|c| c.enabled && metrics::is_sortable(c));
    let (order_by, order_direction) = match sort_by {
        Some(metric) => (
            TermsOrderBy::Column { column_id: metric.id.clone() },
            SortDirection::Desc,
        ),
        None => (TermsOrderBy::Alphabetical, SortDirection::Asc),
    };
    let params = TermsParams {
        size: args.settings.default_terms_size,
        order_by,
        order_direction,
        missing_bucket: false,
    };
    Ok(Column::new(args.id.clone(), OperationParams::Terms(params)).with_field(field.name.clone()))
}

pub(super) fn terms_label(column: &Column) -> String {
    match (&column.params, column.field()) {
        (OperationParams::Terms(p), Some(field)) => format!("Top {} values of {}", p.size, field),
        _ => field_label(column),
    }
}

pub(super) fn terms_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let OperationParams::Terms(params) = &column.params else {
        return Ok(AggFragment::none());
    };
    let field = ctx.require_field(column)?;
    let direction = params.order_direction.as_str();

    let mut order_aggs = Map::new();
    let order_key = match &params.order_by {
        TermsOrderBy::Alphabetical => "_key".to_string(),
        TermsOrderBy::Column { column_id } => {
            let referenced = ctx.collection.by_id(column_id).ok_or_else(|| {
                CompileError::UnresolvedReference {
                    column_id: column.id.clone(),
                    reference: column_id.clone(),
                }
            })?;
            match metrics::value_path(referenced) {
                Some(path) if metrics::is_sortable(referenced) => {
                    let fragment = (definition(referenced.operation_type()).to_dsl)(referenced, ctx)?;
                    match order_shift(column, referenced, ctx) {
                        Some(shift) => {
                            // Rank by the shifted window the merged column reports
                            let wrapper_id = format!("{}-shifted", referenced.id);
                            let mut wrapper = Map::new();
                            wrapper.insert("filter".into(), shifted_time_filter(ctx, &shift)?);
                            let inner = fragment.to_scope(&referenced.id);
                            if !inner.is_empty() {
                                wrapper.insert("aggs".into(), Value::Object(inner));
                            }
                            order_aggs.insert(wrapper_id.clone(), Value::Object(wrapper));
                            format!("{}>{}", wrapper_id, path)
                        }
                        None => {
                            fragment.write_into(&referenced.id, &mut order_aggs);
                            path
                        }
                    }
                }
                _ => "_key".to_string(),
            }
        }
    };

    let mut clause = Map::new();
    clause.insert("field".into(), json!(field.name));
    clause.insert("size".into(), json!(params.size));
    let mut order = Map::new();
    order.insert(order_key, json!(direction));
    clause.insert("order".into(), Value::Object(order));
    if params.missing_bucket {
        clause.insert("missing".into(), json!("__missing__"));
    }

    let mut body = Map::new();
    body.insert("terms".into(), Value::Object(clause));
    if !order_aggs.is_empty() {
        body.insert("aggs".into(), Value::Object(order_aggs));
    }
    Ok(AggFragment::from_body(body))
}

/// The shift a terms ordering metric has to be evaluated under. Only terms
/// above the time-shift split see documents from every window; below it
/// each branch already filters to its own window.
fn order_shift(terms: &Column, ordering: &Column, ctx: &DslContext<'_>) -> Option<ResolvedShift> {
    if !ctx.has_time_shifts || !ordering.enabled {
        return None;
    }
    let shift = ordering.time_shift?.resolve(ctx.time.time_range.as_ref())?;
    let columns = ctx.collection.request_columns();
    let index = columns.iter().position(|c| c.id == terms.id)?;
    (index < split_position(&columns, ctx.time)).then_some(shift)
}

/// Terms only survive onto a field of the same type that is still
/// aggregatable
pub(super) fn terms_transferable(column: &Column, from: &DataView, to: &DataView) -> bool {
    let Some(name) = column.field() else {
        return false;
    };
    let Some(target) = to.get_field(name) else {
        return false;
    };
    let same_type = from
        .get_field(name)
        .map_or(true, |source| source.field_type == target.field_type);
    same_type && terms_applies(target)
}

/// Fall back to alphabetical order when the ordering column went away or
/// can no longer order buckets
pub(super) fn terms_on_other_column_changed(
    column: &Column,
    collection: &ColumnCollection,
) -> Option<Column> {
    let OperationParams::Terms(params) = &column.params else {
        return None;
    };
    let TermsOrderBy::Column { column_id } = &params.order_by else {
        return None;
    };
    let still_valid = collection
        .by_id(column_id)
        .is_some_and(|c| c.id != column.id && metrics::is_sortable(c));
    if still_valid {
        return None;
    }
    let mut updated = column.clone();
    updated.params = OperationParams::Terms(TermsParams {
        order_by: TermsOrderBy::Alphabetical,
        order_direction: SortDirection::Asc,
        ..params.clone()
    });
    Some(updated)
}

pub(super) fn terms_order(
    column: &Column,
    collection: &ColumnCollection,
    a: (&str, &Value),
    b: (&str, &Value),
) -> Ordering {
    let OperationParams::Terms(params) = &column.params else {
        return key_order(column, collection, a, b);
    };
    let ordering = match &params.order_by {
        TermsOrderBy::Alphabetical => compare_keys(bucket_key(a.1), bucket_key(b.1)),
        TermsOrderBy::Column { column_id } => {
            let path = collection.by_id(column_id).and_then(metrics::value_path);
            match path {
                Some(path) => {
                    let x = metrics::read_value(a.1, &path);
                    let y = metrics::read_value(b.1, &path);
                    // Buckets without a value sort after those with one
                    match (x, y) {
                        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                        (Some(_), None) => return Ordering::Less,
                        (None, Some(_)) => return Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                }
                None => compare_keys(bucket_key(a.1), bucket_key(b.1)),
            }
        }
    };
    directed(ordering, params.order_direction)
}

// ---- date histogram ----

pub(super) fn date_histogram_applies(field: &Field) -> bool {
    field.field_type == FieldType::Date && field.aggregatable
}

/// Interval a rolled-up field pins its date histograms to
fn restricted_interval(field: &Field) -> Option<DateInterval> {
    field
        .restriction("date_histogram")?
        .date_interval()?
        .parse()
        .ok()
}

pub(super) fn date_histogram_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let field = args.require_field()?;
    let params = DateHistogramParams {
        interval: restricted_interval(field).unwrap_or(DateInterval::Auto),
        time_zone: field
            .restriction("date_histogram")
            .and_then(|r| r.time_zone.clone()),
        ..DateHistogramParams::default()
    };
    Ok(Column::new(args.id.clone(), OperationParams::DateHistogram(params))
        .with_field(field.name.clone()))
}

/// The concrete interval a date histogram column compiles with
pub(crate) fn effective_interval(column: &Column, ctx: &DslContext<'_>) -> Option<DateInterval> {
    let OperationParams::DateHistogram(params) = &column.params else {
        return None;
    };
    let restricted = column
        .field()
        .and_then(|name| ctx.data_view().get_field(name))
        .and_then(restricted_interval);
    let interval = restricted.unwrap_or(params.interval);
    Some(interval.resolve(ctx.bounds_for(params.bounds.as_ref()), ctx.settings.histogram_bar_target))
}

pub(super) fn date_histogram_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let OperationParams::DateHistogram(params) = &column.params else {
        return Ok(AggFragment::none());
    };
    let field = ctx.require_field(column)?;
    let bounds = ctx.bounds_for(params.bounds.as_ref());

    let mut clause = Map::new();
    clause.insert("field".into(), json!(field.name));
    if let Some(interval) = effective_interval(column, ctx) {
        interval.write_dsl(&mut clause);
    }
    clause.insert("time_zone".into(), json!(date_histogram_time_zone(column, ctx)));
    clause.insert("min_doc_count".into(), json!(if params.include_empty_rows { 0 } else { 1 }));
    // Shifted branches cover different windows; fixed bounds would pad
    // each of them with the baseline's empty buckets
    if params.include_empty_rows && !ctx.has_time_shifts {
        if let Some(range) = bounds {
            clause.insert(
                "extended_bounds".into(),
                json!({
                    "min": range.from.timestamp_millis(),
                    "max": range.to.timestamp_millis(),
                }),
            );
        }
    }
    Ok(AggFragment::clause("date_histogram", Value::Object(clause)))
}

pub(super) fn date_histogram_splits(column: &Column, time: &TimeContext) -> bool {
    column.field().is_some_and(|f| time.is_time_field(f))
}

pub(super) fn date_histogram_interval_ms(column: &Column, ctx: &DslContext<'_>) -> Option<i64> {
    effective_interval(column, ctx)?.as_millis()
}

fn date_histogram_time_zone(column: &Column, ctx: &DslContext<'_>) -> String {
    match &column.params {
        OperationParams::DateHistogram(DateHistogramParams { time_zone: Some(tz), .. }) => tz.clone(),
        _ => ctx.settings.default_time_zone.clone(),
    }
}

/// Keys are moved by calendar months in UTC, which only lands on bucket
/// starts when the buckets are laid out in UTC
pub(super) fn date_histogram_calendar_aligned(column: &Column, ctx: &DslContext<'_>) -> bool {
    matches!(
        date_histogram_time_zone(column, ctx).as_str(),
        "UTC" | "Etc/UTC" | "GMT" | "Etc/GMT" | "Z" | "+00:00" | "00:00"
    )
}

/// A bucket at `T` in a branch shifted by `s` belongs to `T + s`, with
/// calendar shifts moving by whole months
pub(super) fn date_histogram_shifted_key(key: &Value, shift: &ResolvedShift) -> Value {
    let ms = match key.as_i64() {
        Some(ms) => ms,
        None => match key.as_f64() {
            Some(ms) if ms.fract() == 0.0 => ms as i64,
            _ => return key.clone(),
        },
    };
    let shifted = if shift.is_calendar() {
        DateTime::from_timestamp_millis(ms)
            .and_then(|t| shift.forward(t))
            .map(|t| t.timestamp_millis())
    } else {
        ms.checked_add(shift.millis)
    };
    match shifted {
        Some(ms) => json!(ms),
        None => key.clone(),
    }
}

// ---- histogram / range ----

pub(super) fn histogram_applies(field: &Field) -> bool {
    field.field_type == FieldType::Number && field.aggregatable
}

pub(super) fn range_applies(field: &Field) -> bool {
    field.field_type == FieldType::Number && field.aggregatable
}

pub(super) fn histogram_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let field = args.require_field()?;
    let mut params = HistogramParams::default();
    if let Some(interval) = field.restriction("histogram").and_then(|r| r.interval) {
        params.interval = interval;
    }
    Ok(Column::new(args.id.clone(), OperationParams::Histogram(params)).with_field(field.name.clone()))
}

pub(super) fn histogram_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let OperationParams::Histogram(params) = &column.params else {
        return Ok(AggFragment::none());
    };
    let field = ctx.require_field(column)?;
    Ok(AggFragment::clause(
        "histogram",
        json!({
            "field": field.name,
            "interval": params.interval,
            "min_doc_count": if params.include_empty_rows { 0 } else { 1 },
        }),
    ))
}

pub(super) fn range_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let field = args.require_field()?;
    let params = RangeParams {
        ranges: vec![RangeSpec {
            from: Some(0.0),
            to: Some(1000.0),
            label: None,
        }],
    };
    Ok(Column::new(args.id.clone(), OperationParams::Range(params)).with_field(field.name.clone()))
}

pub(super) fn range_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let OperationParams::Range(params) = &column.params else {
        return Ok(AggFragment::none());
    };
    let field = ctx.require_field(column)?;
    let ranges: Vec<Value> = params
        .ranges
        .iter()
        .map(|r| {
            let mut range = Map::new();
            if let Some(from) = r.from {
                range.insert("from".into(), json!(from));
            }
            if let Some(to) = r.to {
                range.insert("to".into(), json!(to));
            }
            if let Some(label) = r.label.as_deref().filter(|l| !l.is_empty()) {
                range.insert("key".into(), json!(label));
            }
            Value::Object(range)
        })
        .collect();
    Ok(AggFragment::clause(
        "range",
        json!({ "field": field.name, "ranges": ranges, "keyed": false }),
    ))
}

pub(super) fn range_order(
    _column: &Column,
    _collection: &ColumnCollection,
    a: (&str, &Value),
    b: (&str, &Value),
) -> Ordering {
    let from = |bucket: &Value| bucket.get("from").and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY);
    from(a.1).partial_cmp(&from(b.1)).unwrap_or(Ordering::Equal)
}

// ---- filters ----

pub(super) fn filters_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    Ok(Column::new(args.id.clone(), OperationParams::Filters(FiltersParams::default())))
}

pub(super) fn filters_label(_column: &Column) -> String {
    "Filters".to_string()
}

pub(super) fn filters_dsl(column: &Column, _ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let OperationParams::Filters(params) = &column.params else {
        return Ok(AggFragment::none());
    };
    let mut filters = Map::new();
    for filter in &params.filters {
        filters.insert(filter.label.clone(), filter.query.clone());
    }
    Ok(AggFragment::clause("filters", json!({ "filters": filters })))
}

/// Keep the declared filter order; unknown labels go last
pub(super) fn filters_order(
    column: &Column,
    _collection: &ColumnCollection,
    a: (&str, &Value),
    b: (&str, &Value),
) -> Ordering {
    let OperationParams::Filters(params) = &column.params else {
        return Ordering::Equal;
    };
    let position = |label: &str| {
        params
            .filters
            .iter()
            .position(|f| f.label == label)
            .unwrap_or(usize::MAX)
    };
    position(a.0).cmp(&position(b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::column::ColumnSpec;
    use crate::config::PipelineSettings;
    use crate::time::{TimeRange, TimeUnit};

    fn data_view() -> DataView {
        DataView::new("logs", "logs-*")
            .with_time_field("timestamp")
            .with_field(Field::new("timestamp", FieldType::Date))
            .with_field(Field::new("host", FieldType::String))
            .with_field(Field::new("bytes", FieldType::Number))
            .with_field(Field::new("message", FieldType::String).not_aggregatable())
    }

    fn collection() -> ColumnCollection {
        ColumnCollection::new(Arc::new(data_view()))
    }

    fn ctx<'a>(
        collection: &'a ColumnCollection,
        time: &'a TimeContext,
        settings: &'a PipelineSettings,
    ) -> DslContext<'a> {
        DslContext {
            collection,
            time,
            settings,
            has_time_shifts: false,
        }
    }

    #[test]
    fn test_terms_applicability() {
        let view = data_view();
        assert!(terms_applies(view.get_field("host").unwrap()));
        assert!(!terms_applies(view.get_field("message").unwrap()));
        assert!(!terms_applies(view.get_field("timestamp").unwrap()));
    }

    #[test]
    fn test_terms_default_order_without_metrics() {
        let mut coll = collection();
        let id = coll.add_operation(crate::column::OperationType::Terms, Some("host")).unwrap();
        let column = coll.by_id(&id).unwrap();
        let OperationParams::Terms(params) = &column.params else {
            panic!("expected terms params");
        };
        assert_eq!(params.size, 3);
        assert_eq!(params.order_by, TermsOrderBy::Alphabetical);
        assert_eq!(params.order_direction, SortDirection::Asc);
    }

    #[test]
    fn test_terms_default_order_by_first_sortable_metric() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("sum").with_id("m").with_field("bytes")).unwrap();
        let id = coll.add_operation(crate::column::OperationType::Terms, Some("host")).unwrap();
        let OperationParams::Terms(params) = &coll.by_id(&id).unwrap().params else {
            panic!("expected terms params");
        };
        assert_eq!(params.order_by, TermsOrderBy::Column { column_id: "m".into() });
        assert_eq!(params.order_direction, SortDirection::Desc);
    }

    #[test]
    fn test_terms_dsl_ordered_by_metric() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("sum").with_id("m").with_field("bytes")).unwrap();
        coll.add(
            ColumnSpec::new("terms")
                .with_id("t")
                .with_field("host")
                .with_params(json!({"size": 5, "order_by": {"type": "column", "column_id": "m"}, "order_direction": "desc"})),
        )
        .unwrap();
        let time = TimeContext::default();
        let settings = PipelineSettings::default();
        let fragment = terms_dsl(coll.by_id("t").unwrap(), &ctx(&coll, &time, &settings)).unwrap();
        assert_eq!(
            Value::Object(fragment.body.unwrap()),
            json!({
                "terms": {"field": "host", "size": 5, "order": {"m": "desc"}},
                "aggs": {"m": {"sum": {"field": "bytes"}}}
            })
        );
    }

    #[test]
    fn test_terms_dsl_ordered_by_document_count() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("count").with_id("c")).unwrap();
        coll.add(
            ColumnSpec::new("terms")
                .with_id("t")
                .with_field("host")
                .with_params(json!({"order_by": {"type": "column", "column_id": "c"}, "order_direction": "desc", "missing_bucket": true})),
        )
        .unwrap();
        let time = TimeContext::default();
        let settings = PipelineSettings::default();
        let fragment = terms_dsl(coll.by_id("t").unwrap(), &ctx(&coll, &time, &settings)).unwrap();
        assert_eq!(
            Value::Object(fragment.body.unwrap()),
            json!({"terms": {"field": "host", "size": 3, "order": {"_count": "desc"}, "missing": "__missing__"}})
        );
    }

    #[test]
    fn test_terms_falls_back_when_order_column_removed() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("sum").with_id("m").with_field("bytes")).unwrap();
        let id = coll.add_operation(crate::column::OperationType::Terms, Some("host")).unwrap();
        coll.remove("m").unwrap();
        let OperationParams::Terms(params) = &coll.by_id(&id).unwrap().params else {
            panic!("expected terms params");
        };
        assert_eq!(params.order_by, TermsOrderBy::Alphabetical);
        assert_eq!(params.order_direction, SortDirection::Asc);
    }

    #[test]
    fn test_terms_transfer_requires_same_type() {
        let column = Column::new("t", OperationParams::Terms(TermsParams::default())).with_field("host");
        let from = data_view();
        let same = DataView::new("b", "b").with_field(Field::new("host", FieldType::String));
        let retyped = DataView::new("c", "c").with_field(Field::new("host", FieldType::Number));
        let missing = DataView::new("d", "d");
        assert!(terms_transferable(&column, &from, &same));
        assert!(!terms_transferable(&column, &from, &retyped));
        assert!(!terms_transferable(&column, &from, &missing));
    }

    #[test]
    fn test_date_histogram_dsl_with_bounds() {
        let mut coll = collection();
        coll.add(
            ColumnSpec::new("date_histogram")
                .with_id("d")
                .with_field("timestamp")
                .with_params(json!({"interval": "1h"})),
        )
        .unwrap();
        let range = TimeRange::parse("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z").unwrap();
        let time = TimeContext::new(range, vec!["timestamp".into()]);
        let settings = PipelineSettings::default();
        let fragment = date_histogram_dsl(coll.by_id("d").unwrap(), &ctx(&coll, &time, &settings)).unwrap();
        assert_eq!(
            Value::Object(fragment.body.unwrap()),
            json!({"date_histogram": {
                "field": "timestamp",
                "fixed_interval": "1h",
                "time_zone": "UTC",
                "min_doc_count": 0,
                "extended_bounds": {"min": 1704067200000i64, "max": 1704153600000i64}
            }})
        );
    }

    #[test]
    fn test_restricted_interval_wins() {
        let restricted = Field::new("timestamp", FieldType::Date).with_restriction(
            "date_histogram",
            crate::data_view::AggregationRestriction {
                fixed_interval: Some("1h".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            restricted_interval(&restricted),
            Some(DateInterval::Fixed { amount: 1, unit: TimeUnit::Hour })
        );
        assert!(date_histogram_applies(&restricted));
        assert!(!terms_applies(&restricted));
    }

    fn resolved(amount: u32, unit: TimeUnit) -> ResolvedShift {
        let d = crate::time::ShiftDuration::new(amount, unit);
        ResolvedShift { millis: d.as_millis(), duration: Some(d) }
    }

    #[test]
    fn test_shifted_key_adds_offset() {
        let day = resolved(1, TimeUnit::Day);
        assert_eq!(date_histogram_shifted_key(&json!(1000), &day), json!(86_401_000));
        assert_eq!(same_key(&json!("a"), &day), json!("a"));
    }

    #[test]
    fn test_shifted_key_moves_by_calendar_months() {
        // 2024-02-04 and 2024-03-04, midnight UTC
        let month = resolved(1, TimeUnit::Month);
        assert_eq!(date_histogram_shifted_key(&json!(1_707_004_800_000i64), &month), json!(1_709_510_400_000i64));
        // 2023-03-04 -> 2024-03-04
        let year = resolved(1, TimeUnit::Year);
        assert_eq!(date_histogram_shifted_key(&json!(1_677_888_000_000i64), &year), json!(1_709_510_400_000i64));
    }

    #[test]
    fn test_calendar_alignment_needs_utc_buckets() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("date_histogram").with_id("utc").with_field("timestamp")).unwrap();
        coll.add(
            ColumnSpec::new("date_histogram")
                .with_id("berlin")
                .with_field("timestamp")
                .with_params(json!({"time_zone": "Europe/Berlin"})),
        )
        .unwrap();
        let time = TimeContext::default();
        let settings = PipelineSettings::default();
        let ctx = ctx(&coll, &time, &settings);
        assert!(date_histogram_calendar_aligned(coll.by_id("utc").unwrap(), &ctx));
        assert!(!date_histogram_calendar_aligned(coll.by_id("berlin").unwrap(), &ctx));
    }

    #[test]
    fn test_range_dsl() {
        let mut coll = collection();
        coll.add(
            ColumnSpec::new("range")
                .with_id("r")
                .with_field("bytes")
                .with_params(json!({"ranges": [{"to": 100.0}, {"from": 100.0, "label": "big"}]})),
        )
        .unwrap();
        let time = TimeContext::default();
        let settings = PipelineSettings::default();
        let fragment = range_dsl(coll.by_id("r").unwrap(), &ctx(&coll, &time, &settings)).unwrap();
        assert_eq!(
            Value::Object(fragment.body.unwrap()),
            json!({"range": {"field": "bytes", "ranges": [{"to": 100.0}, {"from": 100.0, "key": "big"}], "keyed": false}})
        );
    }

    #[test]
    fn test_filters_order_follows_declaration() {
        let column = Column::new(
            "f",
            OperationParams::Filters(FiltersParams {
                filters: vec![
                    crate::column::FilterSpec { label: "b".into(), query: json!({}) },
                    crate::column::FilterSpec { label: "a".into(), query: json!({}) },
                ],
            }),
        );
        let coll = collection();
        assert_eq!(filters_order(&column, &coll, ("b", &json!({})), ("a", &json!({}))), Ordering::Less);
    }

    #[test]
    fn test_compare_keys() {
        assert_eq!(compare_keys(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_keys(&json!(1), &json!("a")), Ordering::Less);
        assert_eq!(compare_keys(&json!("b"), &json!("a")), Ordering::Greater);
    }
}
