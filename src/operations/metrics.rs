//! Metric operations
//!
//! Field metrics, percentiles, last value and filter ratio, plus the value
//! paths sibling aggregations use to read them.

use serde_json::{json, Map, Value};
use crate::collection::CollectionError;
use crate::column::{Column, LastValueParams, FilterRatioParams, OperationParams, OperationType};
use crate::compiler::CompileError;
use crate::data_view::{DataView, Field, FieldType};
use crate::dsl::AggFragment;
use super::context::{BuildColumnArgs, DslContext};
use super::registry::{definition, transfer_by_field};

// ---- applicability ----

pub(super) fn count_applies(field: &Field) -> bool {
    field.aggregatable
}

pub(super) fn numeric_applies(field: &Field) -> bool {
    matches!(field.field_type, FieldType::Number | FieldType::Histogram) && field.aggregatable
}

pub(super) fn unique_count_applies(field: &Field) -> bool {
    field.aggregatable && !matches!(field.field_type, FieldType::Histogram | FieldType::Unknown)
}

pub(super) fn last_value_applies(field: &Field) -> bool {
    field.aggregatable && field.field_type != FieldType::Histogram
}

// ---- builders ----

pub(super) fn field_metric_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let params = OperationParams::default_for(args.operation)
        .ok_or_else(|| CollectionError::UnknownOperationType(args.operation.to_string()))?;
    if args.operation == OperationType::Count && args.field.is_none() {
        return Ok(Column::new(args.id.clone(), params));
    }
    let field = args.require_field()?;
    Ok(Column::new(args.id.clone(), params).with_field(field.name.clone()))
}

/// Last value sorts by the data view's time field
pub(super) fn last_value_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let field = args.require_field()?;
    let sort_field = args
        .data_view()
        .time_field_name
        .clone()
        .ok_or(CollectionError::MissingTimeField)?;
    Ok(Column::new(args.id.clone(), OperationParams::LastValue(LastValueParams { sort_field }))
        .with_field(field.name.clone()))
}

/// Both sides start as document counts over every record
pub(super) fn filter_ratio_build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let side = |suffix: &str| {
        Box::new(
            Column::new(format!("{}-{}", args.id, suffix), OperationParams::Count)
                .with_filter(json!({ "match_all": {} })),
        )
    };
    let params = FilterRatioParams {
        numerator: side("numerator"),
        denominator: side("denominator"),
    };
    Ok(Column::new(args.id.clone(), OperationParams::FilterRatio(params)))
}

// ---- labels ----

pub(super) fn count_label(column: &Column) -> String {
    match column.field() {
        Some(field) => format!("Count of {}", field),
        None => "Count of records".to_string(),
    }
}

pub(super) fn field_metric_label(column: &Column) -> String {
    let name = definition(column.operation_type()).display_name;
    match column.field() {
        Some(field) => format!("{} of {}", name, field),
        None => name.to_string(),
    }
}

pub(super) fn percentile_label(column: &Column) -> String {
    let OperationParams::Percentile(params) = &column.params else {
        return field_metric_label(column);
    };
    let rank = if params.percentile.fract() == 0.0 {
        format!("{:.0}", params.percentile)
    } else {
        params.percentile.to_string()
    };
    format!("{}th percentile of {}", rank, column.field().unwrap_or_default())
}

pub(super) fn filter_ratio_label(_column: &Column) -> String {
    "Filter ratio".to_string()
}

// ---- DSL ----

/// Scope `inner` to the column's filter, if it has one.
///
/// The filter aggregation takes the column id; the real metric sits below
/// it as `<id>-metric`.
fn with_filter(column: &Column, inner: AggFragment) -> AggFragment {
    let Some(query) = &column.filter else {
        return inner;
    };
    let mut body = Map::new();
    body.insert("filter".into(), query.clone());
    let sub = inner.to_scope(&metric_child_id(column));
    if !sub.is_empty() {
        body.insert("aggs".into(), Value::Object(sub));
    }
    AggFragment::from_body(body)
}

fn metric_child_id(column: &Column) -> String {
    format!("{}-metric", column.id)
}

fn agg_kind(op: OperationType) -> Option<&'static str> {
    match op {
        OperationType::Count => Some("value_count"),
        OperationType::Sum => Some("sum"),
        OperationType::Average => Some("avg"),
        OperationType::Min => Some("min"),
        OperationType::Max => Some("max"),
        OperationType::UniqueCount => Some("cardinality"),
        _ => None,
    }
}

pub(super) fn count_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    if column.is_document_count() {
        return Ok(with_filter(column, AggFragment::none()));
    }
    field_metric_dsl(column, ctx)
}

pub(super) fn field_metric_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let field = ctx.require_field(column)?;
    let Some(kind) = agg_kind(column.operation_type()) else {
        return Ok(AggFragment::none());
    };
    let inner = AggFragment::clause(kind, json!({ "field": field.name }));
    Ok(with_filter(column, inner))
}

pub(super) fn percentiles_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let field = ctx.require_field(column)?;
    let percent = match &column.params {
        OperationParams::Percentile(p) => p.percentile,
        _ => 50.0,
    };
    let inner = AggFragment::clause(
        "percentiles",
        json!({ "field": field.name, "percents": [percent] }),
    );
    Ok(with_filter(column, inner))
}

pub(super) fn last_value_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let field = ctx.require_field(column)?;
    let OperationParams::LastValue(params) = &column.params else {
        return Ok(AggFragment::none());
    };
    let mut sort = Map::new();
    sort.insert(params.sort_field.clone(), json!({ "order": "desc" }));
    let inner = AggFragment::clause(
        "top_hits",
        json!({
            "size": 1,
            "sort": [sort],
            "fields": [field.name],
            "_source": false,
        }),
    );
    Ok(with_filter(column, inner))
}

/// A sub-column re-homed as one side of a ratio: `<id>-<side>`, always
/// filtered
fn ratio_side(column: &Column, side: &str, sub: &Column) -> Column {
    let mut placed = sub.clone();
    placed.id = format!("{}-{}", column.id, side);
    if placed.filter.is_none() {
        placed.filter = Some(json!({ "match_all": {} }));
    }
    placed
}

/// Both sides become filter aggregations next to the column; the column
/// itself divides them
pub(super) fn filter_ratio_dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let OperationParams::FilterRatio(params) = &column.params else {
        return Ok(AggFragment::none());
    };
    let mut fragment = AggFragment::none();
    let mut paths = Map::new();
    for (side, sub) in [("numerator", &params.numerator), ("denominator", &params.denominator)] {
        let placed = ratio_side(column, side, sub);
        let path = value_path(&placed).ok_or_else(|| CompileError::UnresolvedReference {
            column_id: column.id.clone(),
            reference: sub.id.clone(),
        })?;
        let side_fragment = (definition(placed.operation_type()).to_dsl)(&placed, ctx)?;
        fragment = fragment.with_parent(placed.id.clone(), side_fragment);
        paths.insert(side.to_string(), json!(path));
    }
    let script = AggFragment::clause(
        "bucket_script",
        json!({
            "buckets_path": paths,
            "script": "params.numerator / params.denominator",
        }),
    );
    fragment.body = script.body;
    Ok(fragment)
}

// ---- transfer ----

pub(super) fn last_value_transferable(column: &Column, from: &DataView, to: &DataView) -> bool {
    let sort_ok = match &column.params {
        OperationParams::LastValue(p) => to.get_field(&p.sort_field).is_some(),
        _ => true,
    };
    sort_ok && transfer_by_field(column, from, to)
}

pub(super) fn filter_ratio_transferable(column: &Column, from: &DataView, to: &DataView) -> bool {
    column
        .sub_columns()
        .into_iter()
        .all(|sub| (definition(sub.operation_type()).is_transferable)(sub, from, to))
}

// ---- value paths ----

/// Path to a metric's value from the scope the metric sits in, in engine
/// `buckets_path` syntax. `None` when the value cannot be addressed.
pub(crate) fn value_path(column: &Column) -> Option<String> {
    if column.is_document_count() {
        return Some(match column.filter {
            Some(_) => format!("{}>_count", column.id),
            None => "_count".to_string(),
        });
    }
    let (filterable, suffix) = match &column.params {
        OperationParams::Count
        | OperationParams::Sum
        | OperationParams::Average
        | OperationParams::Min
        | OperationParams::Max
        | OperationParams::UniqueCount => (true, String::new()),
        OperationParams::Median => (true, "[50.0]".to_string()),
        OperationParams::Percentile(p) => (true, format!("[{:?}]", p.percentile)),
        OperationParams::FilterRatio(_)
        | OperationParams::CumulativeSum
        | OperationParams::Differences
        | OperationParams::MovingAverage(_) => (false, String::new()),
        _ => return None,
    };
    let target = if filterable && column.filter.is_some() {
        format!("{}>{}", column.id, metric_child_id(column))
    } else {
        column.id.clone()
    };
    Some(format!("{}{}", target, suffix))
}

pub(crate) fn is_sortable(column: &Column) -> bool {
    matches!(
        column.operation_type(),
        OperationType::Count
            | OperationType::Sum
            | OperationType::Average
            | OperationType::Min
            | OperationType::Max
            | OperationType::Median
            | OperationType::UniqueCount
            | OperationType::Percentile
    )
}

/// Read a `value_path` back out of a response bucket
pub(crate) fn read_value(bucket: &Value, path: &str) -> Option<f64> {
    let segments: Vec<&str> = path.split('>').collect();
    let mut current = bucket;
    for (i, segment) in segments.iter().enumerate() {
        let (name, percent) = match segment.split_once('[') {
            Some((name, rest)) => (name, rest.strip_suffix(']')),
            None => (*segment, None),
        };
        if name == "_count" {
            return current.get("doc_count")?.as_f64();
        }
        current = current.get(name)?;
        if i + 1 == segments.len() {
            return match percent {
                Some(p) => current.get("values")?.get(p)?.as_f64(),
                None => current.get("value")?.as_f64(),
            };
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::collection::ColumnCollection;
    use crate::column::{ColumnSpec, PercentileParams};
    use crate::config::PipelineSettings;
    use crate::time::TimeContext;

    fn collection() -> ColumnCollection {
        let view = DataView::new("logs", "logs-*")
            .with_time_field("timestamp")
            .with_field(Field::new("timestamp", FieldType::Date))
            .with_field(Field::new("host", FieldType::String))
            .with_field(Field::new("bytes", FieldType::Number));
        ColumnCollection::new(Arc::new(view))
    }

    fn compile_one(coll: &ColumnCollection, id: &str) -> Map<String, Value> {
        let time = TimeContext::default();
        let settings = PipelineSettings::default();
        let ctx = DslContext {
            collection: coll,
            time: &time,
            settings: &settings,
            has_time_shifts: false,
        };
        let column = coll.by_id(id).unwrap();
        let fragment = (definition(column.operation_type()).to_dsl)(column, &ctx).unwrap();
        fragment.to_scope(id)
    }

    #[test]
    fn test_document_count_has_no_dsl() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("count").with_id("c")).unwrap();
        assert!(compile_one(&coll, "c").is_empty());
    }

    #[test]
    fn test_count_on_field_is_value_count() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("count").with_id("c").with_field("host")).unwrap();
        assert_eq!(
            Value::Object(compile_one(&coll, "c")),
            json!({"c": {"value_count": {"field": "host"}}})
        );
    }

    #[test]
    fn test_filtered_metric_wraps_inner() {
        let mut coll = collection();
        let mut spec = ColumnSpec::new("sum").with_id("s").with_field("bytes");
        spec.filter = Some(json!({"term": {"host": "a"}}));
        coll.add(spec).unwrap();
        assert_eq!(
            Value::Object(compile_one(&coll, "s")),
            json!({"s": {
                "filter": {"term": {"host": "a"}},
                "aggs": {"s-metric": {"sum": {"field": "bytes"}}}
            }})
        );
    }

    #[test]
    fn test_percentile_dsl_and_path() {
        let column = Column::new("p", OperationParams::Percentile(PercentileParams { percentile: 99.5 }))
            .with_field("bytes");
        assert_eq!(value_path(&column).as_deref(), Some("p[99.5]"));
        let median = Column::new("m", OperationParams::Median).with_field("bytes");
        assert_eq!(value_path(&median).as_deref(), Some("m[50.0]"));
    }

    #[test]
    fn test_last_value_dsl() {
        let mut coll = collection();
        let id = coll.add_operation(OperationType::LastValue, Some("host")).unwrap();
        let scope = compile_one(&coll, &id);
        assert_eq!(
            scope[&id],
            json!({"top_hits": {
                "size": 1,
                "sort": [{"timestamp": {"order": "desc"}}],
                "fields": ["host"],
                "_source": false
            }})
        );
    }

    #[test]
    fn test_filter_ratio_dsl() {
        let mut coll = collection();
        let id = coll.add_operation(OperationType::FilterRatio, None).unwrap();
        let scope = compile_one(&coll, &id);
        let keys: Vec<&String> = scope.keys().collect();
        assert_eq!(
            keys,
            vec![&format!("{}-numerator", id), &format!("{}-denominator", id), &id]
        );
        assert_eq!(
            scope[&id]["bucket_script"]["buckets_path"],
            json!({
                "numerator": format!("{}-numerator>_count", id),
                "denominator": format!("{}-denominator>_count", id),
            })
        );
    }

    #[test]
    fn test_read_value() {
        let bucket = json!({
            "doc_count": 4,
            "s": {"value": 10.0},
            "p": {"values": {"95.0": 3.5}},
            "f": {"doc_count": 2, "f-metric": {"value": 1.0}}
        });
        assert_eq!(read_value(&bucket, "_count"), Some(4.0));
        assert_eq!(read_value(&bucket, "s"), Some(10.0));
        assert_eq!(read_value(&bucket, "p[95.0]"), Some(3.5));
        assert_eq!(read_value(&bucket, "f>f-metric"), Some(1.0));
        assert_eq!(read_value(&bucket, "f>_count"), Some(2.0));
        assert_eq!(read_value(&bucket, "missing"), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(count_label(&Column::new("c", OperationParams::Count)), "Count of records");
        let sum = Column::new("s", OperationParams::Sum).with_field("bytes");
        assert_eq!(field_metric_label(&sum), "Sum of bytes");
        let p = Column::new("p", OperationParams::Percentile(PercentileParams::default())).with_field("bytes");
        assert_eq!(percentile_label(&p), "95th percentile of bytes");
    }
}
