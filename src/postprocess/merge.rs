//! Folding the time-shift branches of a response back into one tree

use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use tracing::{debug, warn};
use crate::collection::ColumnCollection;
use crate::column::Column;
use crate::compiler::split_position;
use crate::dsl::TIME_SHIFT_SPLIT_ID;
use crate::operations::definition;
use crate::time::{ResolvedShift, TimeContext, TimeRange};

/// Undo the time-shift fan-out of a response.
///
/// Without shifts the response is handed back untouched. Otherwise the
/// `aggregations` subtree (or the whole value when it has none) of a deep
/// copy is merged: every `time_offset_split` is replaced by the union of
/// its branches, with shifted doc counts stored as `doc_count_<ms>`.
///
/// A shifted metric is written only into buckets its branch has a match
/// for. A baseline bucket with no counterpart in a shifted window gets
/// `doc_count_<ms>: 0` and no entry for that window's metrics; the key is
/// absent, not `null`.
pub fn post_flight_transform<'a>(
    response: &'a Value,
    collection: &ColumnCollection,
    time: &TimeContext,
) -> Cow<'a, Value> {
    let range = time.time_range.as_ref();
    let shifts = collection.time_shifts(range);
    if shifts.is_empty() {
        return Cow::Borrowed(response);
    }

    let columns = collection.request_columns();
    let merger = Merger {
        collection,
        split_index: split_position(&columns, time),
        columns,
        range,
        shifts,
    };

    let mut merged = response.clone();
    let root = if merged.get("aggregations").is_some() {
        &mut merged["aggregations"]
    } else {
        &mut merged
    };
    match root {
        Value::Object(scope) => merger.transform(scope, 0),
        _ => warn!("Response has no aggregation object, nothing to merge"),
    }
    debug!(shifts = merger.shifts.len(), split_at = merger.split_index, "Merged time shift branches");
    Cow::Owned(merged)
}

struct Merger<'a> {
    collection: &'a ColumnCollection,
    columns: Vec<&'a Column>,
    split_index: usize,
    range: Option<&'a TimeRange>,
    shifts: Vec<ResolvedShift>,
}

impl<'a> Merger<'a> {
    /// Walk down the bucket levels above the split and merge it in place
    fn transform(&self, scope: &mut Map<String, Value>, level: usize) {
        if level == self.split_index {
            self.merge_split(scope, level);
            return;
        }
        let Some(column) = self.columns.get(level) else {
            return;
        };
        let Some(buckets) = scope.get_mut(&column.id).and_then(|agg| agg.get_mut("buckets")) else {
            // The bucket was the innermost scope; nothing below it
            return;
        };
        match buckets {
            Value::Array(items) => {
                for bucket in items.iter_mut() {
                    if let Value::Object(bucket) = bucket {
                        self.transform(bucket, level + 1);
                    }
                }
            }
            Value::Object(items) => {
                for bucket in items.values_mut() {
                    if let Value::Object(bucket) = bucket {
                        self.transform(bucket, level + 1);
                    }
                }
            }
            _ => warn!(column = %column.id, "Unexpected bucket container, skipping"),
        }
    }

    fn merge_split(&self, scope: &mut Map<String, Value>, level: usize) {
        let Some(split) = scope.get(TIME_SHIFT_SPLIT_ID) else {
            warn!(level, "Time shift split missing from response scope");
            return;
        };
        let Some(branches) = split.get("buckets").and_then(Value::as_object) else {
            warn!(level, "Time shift split has no keyed buckets");
            return;
        };

        let mut ordered: Vec<(ResolvedShift, &Map<String, Value>)> = branches
            .iter()
            .filter_map(|(key, branch)| Some((self.branch_shift(key.parse().ok()?), branch.as_object()?)))
            .collect();
        ordered.sort_by_key(|(shift, _)| shift.millis);

        let mut merged = Map::new();
        for (shift, branch) in &ordered {
            self.merge_level(&mut merged, branch, shift, level);
        }

        let mut rebuilt = Map::new();
        for (key, value) in std::mem::take(scope) {
            if key == TIME_SHIFT_SPLIT_ID {
                for (merged_key, merged_value) in std::mem::take(&mut merged) {
                    rebuilt.insert(merged_key, merged_value);
                }
            } else if !rebuilt.contains_key(&key) {
                rebuilt.insert(key, value);
            }
        }
        *scope = rebuilt;
    }

    /// Merge one branch (or one bucket of a branch) into `target`
    fn merge_level(
        &self,
        target: &mut Map<String, Value>,
        source: &Map<String, Value>,
        shift: &ResolvedShift,
        level: usize,
    ) {
        for (key, value) in source {
            if key == "doc_count" {
                let name = if shift.is_zero() {
                    "doc_count".to_string()
                } else {
                    format!("doc_count_{}", shift.key())
                };
                target.insert(name, value.clone());
                continue;
            }
            let Value::Object(sub) = value else {
                if shift.is_zero() && !target.contains_key(key) {
                    target.insert(key.clone(), value.clone());
                }
                continue;
            };

            match self.owner(key) {
                Some((_, column)) if column.is_metric() => {
                    if self.shift_of(column) == shift.millis {
                        target.insert(key.clone(), value.clone());
                    }
                }
                Some((index, column)) if index == level && column.is_bucket() => {
                    self.merge_buckets(target, key, sub, column, shift, level);
                }
                _ => {
                    if shift.is_zero() {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }

    fn merge_buckets(
        &self,
        target: &mut Map<String, Value>,
        key: &str,
        source: &Map<String, Value>,
        column: &Column,
        shift: &ResolvedShift,
        level: usize,
    ) {
        let Some(source_buckets) = source.get("buckets") else {
            warn!(column = %column.id, "Bucket aggregation without buckets, skipping");
            return;
        };
        let entry = target.entry(key.to_string()).or_insert_with(|| {
            // Everything but the buckets comes from whichever branch arrives first
            let mut shell = Map::new();
            for (k, v) in source {
                if k != "buckets" {
                    shell.insert(k.clone(), v.clone());
                }
            }
            Value::Object(shell)
        });
        let Value::Object(agg) = entry else {
            return;
        };

        let mut existing: Vec<(String, Map<String, Value>)> = match agg.get("buckets") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|b| Some((key_string(b.get("key")?), b.as_object()?.clone())))
                .collect(),
            Some(Value::Object(items)) => items
                .iter()
                .filter_map(|(k, b)| Some((k.clone(), b.as_object()?.clone())))
                .collect(),
            _ => Vec::new(),
        };
        let keyed = match (agg.get("buckets"), source_buckets) {
            (Some(current), _) => current.is_object(),
            (None, incoming) => incoming.is_object(),
        };

        let Some(behavior) = definition(column.operation_type()).bucket.as_ref() else {
            return;
        };
        let incoming: Vec<(String, Value, &Map<String, Value>)> = match source_buckets {
            Value::Array(items) => items
                .iter()
                .filter_map(|b| {
                    let shifted = (behavior.shifted_key)(b.get("key")?, shift);
                    Some((key_string(&shifted), shifted, b.as_object()?))
                })
                .collect(),
            Value::Object(items) => items
                .iter()
                .filter_map(|(k, b)| Some((k.clone(), Value::String(k.clone()), b.as_object()?)))
                .collect(),
            _ => {
                warn!(column = %column.id, "Unexpected bucket container, skipping");
                return;
            }
        };

        let mut matched = vec![false; existing.len()];
        for (bucket_key, shifted, bucket) in incoming {
            let position = match existing.iter().position(|(k, _)| *k == bucket_key) {
                Some(position) => position,
                None => {
                    // Only the shifted window has this bucket
                    let mut placeholder = Map::new();
                    if !keyed {
                        placeholder.insert("key".into(), shifted);
                    }
                    placeholder.insert("doc_count".into(), json!(0));
                    existing.push((bucket_key, placeholder));
                    matched.push(false);
                    existing.len() - 1
                }
            };
            matched[position] = true;
            // Key fields of a shifted bucket describe the shifted window
            let mut body = bucket.clone();
            if !shift.is_zero() {
                body = body.into_iter().filter(|(k, _)| k != "key" && k != "key_as_string").collect();
            }
            self.merge_level(&mut existing[position].1, &body, shift, level + 1);
        }
        if !shift.is_zero() {
            let name = format!("doc_count_{}", shift.key());
            for ((_, bucket), seen) in existing.iter_mut().zip(&matched) {
                if !seen {
                    bucket.insert(name.clone(), json!(0));
                }
            }
        }

        let mut sorted: Vec<(String, Value)> = existing
            .into_iter()
            .map(|(k, b)| (k, Value::Object(b)))
            .collect();
        sorted.sort_by(|a, b| self.order(column, a, b));
        let buckets = if keyed {
            Value::Object(sorted.into_iter().collect())
        } else {
            Value::Array(sorted.into_iter().map(|(_, b)| b).collect())
        };
        agg.insert("buckets".into(), buckets);
    }

    fn order(&self, column: &Column, a: &(String, Value), b: &(String, Value)) -> Ordering {
        match definition(column.operation_type()).bucket.as_ref() {
            Some(behavior) => (behavior.order_buckets)(column, self.collection, (&a.0, &a.1), (&b.0, &b.1)),
            None => Ordering::Equal,
        }
    }

    /// The request column a response key belongs to: the column with that
    /// id, or the longest id whose auxiliary aggregations are `<id>-...`
    fn owner(&self, key: &str) -> Option<(usize, &'a Column)> {
        let exact = self.columns.iter().position(|c| c.id == key);
        let index = exact.or_else(|| {
            self.columns
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    key.strip_prefix(c.id.as_str()).is_some_and(|rest| rest.starts_with('-'))
                })
                .max_by_key(|(_, c)| c.id.len())
                .map(|(i, _)| i)
        })?;
        Some((index, self.columns[index]))
    }

    /// The shift a branch key stands for; calendar shifts keep their months
    fn branch_shift(&self, millis: i64) -> ResolvedShift {
        self.shifts
            .iter()
            .find(|s| s.millis == millis)
            .copied()
            .unwrap_or(ResolvedShift { millis, duration: None })
    }

    fn shift_of(&self, column: &Column) -> i64 {
        column
            .time_shift
            .and_then(|s| s.resolve(self.range))
            .map_or(0, |s| s.millis)
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::column::ColumnSpec;
    use crate::data_view::{DataView, Field, FieldType};

    const DAY: i64 = 86_400_000;

    fn collection() -> ColumnCollection {
        let view = DataView::new("logs", "logs-*")
            .with_time_field("timestamp")
            .with_field(Field::new("timestamp", FieldType::Date))
            .with_field(Field::new("host", FieldType::String))
            .with_field(Field::new("bytes", FieldType::Number));
        ColumnCollection::new(Arc::new(view))
    }

    fn week() -> TimeContext {
        TimeContext::new(
            TimeRange::parse("2024-01-10T00:00:00Z", "2024-01-17T00:00:00Z").unwrap(),
            vec!["timestamp".into()],
        )
    }

    #[test]
    fn test_no_shifts_is_borrowed_identity() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("sum").with_id("s").with_field("bytes")).unwrap();
        let response = json!({"aggregations": {"s": {"value": 3.0}}});
        let out = post_flight_transform(&response, &coll, &week());
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(*out, response);
    }

    #[test]
    fn test_date_histogram_branches_merge_by_shifted_key() {
        let mut coll = collection();
        coll.add(
            ColumnSpec::new("date_histogram")
                .with_id("d")
                .with_field("timestamp")
                .with_params(json!({"interval": "1d"})),
        )
        .unwrap();
        coll.add(ColumnSpec::new("sum").with_id("now").with_field("bytes")).unwrap();
        coll.add(ColumnSpec::new("sum").with_id("prev").with_field("bytes").with_time_shift("1d")).unwrap();

        let response = json!({"aggregations": {"time_offset_split": {"buckets": {
            "0": {"doc_count": 5, "d": {"buckets": [
                {"key": 2 * DAY, "doc_count": 2, "now": {"value": 10.0}, "prev": {"value": 99.0}},
                {"key": 3 * DAY, "doc_count": 3, "now": {"value": 20.0}, "prev": {"value": 99.0}}
            ]}},
            "86400000": {"doc_count": 4, "d": {"buckets": [
                {"key": DAY, "doc_count": 1, "now": {"value": 99.0}, "prev": {"value": 7.0}},
                {"key": 2 * DAY, "doc_count": 3, "now": {"value": 99.0}, "prev": {"value": 8.0}}
            ]}}
        }}}});

        let out = post_flight_transform(&response, &coll, &week()).into_owned();
        let aggs = &out["aggregations"];
        assert!(aggs.get(TIME_SHIFT_SPLIT_ID).is_none());
        assert_eq!(aggs["doc_count"], json!(5));
        assert_eq!(aggs["doc_count_86400000"], json!(4));

        let buckets = aggs["d"]["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0]["key"], json!(2 * DAY));
        assert_eq!(buckets[0]["doc_count"], json!(2));
        assert_eq!(buckets[0]["doc_count_86400000"], json!(1));
        assert_eq!(buckets[0]["now"]["value"], json!(10.0));
        assert_eq!(buckets[0]["prev"]["value"], json!(7.0));
        assert_eq!(buckets[1]["doc_count_86400000"], json!(3));
        assert_eq!(buckets[1]["prev"]["value"], json!(8.0));
    }

    #[test]
    fn test_shifted_only_bucket_gets_placeholder() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("terms").with_id("t").with_field("host")).unwrap();
        coll.add(ColumnSpec::new("sum").with_id("prev").with_field("bytes").with_time_shift("1d")).unwrap();

        let response = json!({"aggregations": {"t": {"buckets": [
            {"key": "a", "doc_count": 4, "time_offset_split": {"buckets": {
                "0": {"doc_count": 2},
                "86400000": {"doc_count": 2, "prev": {"value": 1.0}}
            }}}
        ]}}});
        let out = post_flight_transform(&response, &coll, &week()).into_owned();
        let bucket = &out["aggregations"]["t"]["buckets"][0];
        assert_eq!(bucket["key"], json!("a"));
        assert_eq!(bucket["doc_count"], json!(2));
        assert_eq!(bucket["doc_count_86400000"], json!(2));
        assert_eq!(bucket["prev"]["value"], json!(1.0));
        assert!(bucket.get(TIME_SHIFT_SPLIT_ID).is_none());
    }

    #[test]
    fn test_unmatched_baseline_bucket_gets_zero_count() {
        let mut coll = collection();
        coll.add(
            ColumnSpec::new("date_histogram")
                .with_id("d")
                .with_field("timestamp")
                .with_params(json!({"interval": "1d"})),
        )
        .unwrap();
        coll.add(ColumnSpec::new("count").with_id("c").with_field("bytes").with_time_shift("1d")).unwrap();

        let response = json!({"time_offset_split": {"buckets": {
            "0": {"d": {"buckets": [{"key": DAY, "doc_count": 1}]}},
            "86400000": {"d": {"buckets": [{"key": DAY, "doc_count": 6, "c": {"value": 6}}]}}
        }}});
        let out = post_flight_transform(&response, &coll, &week()).into_owned();
        let buckets = out["d"]["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0]["key"], json!(DAY));
        assert_eq!(buckets[0]["doc_count_86400000"], json!(0));
        assert_eq!(buckets[1]["key"], json!(2 * DAY));
        assert_eq!(buckets[1]["doc_count"], json!(0));
        assert_eq!(buckets[1]["c"]["value"], json!(6));
    }

    #[test]
    fn test_keyed_buckets_stay_keyed() {
        let mut coll = collection();
        coll.add(
            ColumnSpec::new("filters")
                .with_id("f")
                .with_params(json!({"filters": [
                    {"label": "errors", "query": {"term": {"status": 500}}},
                    {"label": "ok", "query": {"term": {"status": 200}}}
                ]})),
        )
        .unwrap();
        coll.add(ColumnSpec::new("sum").with_id("prev").with_field("bytes").with_time_shift("1d")).unwrap();

        let response = json!({"aggregations": {"f": {"buckets": {
            "ok": {"doc_count": 3, "time_offset_split": {"buckets": {
                "0": {"doc_count": 1}, "86400000": {"doc_count": 2, "prev": {"value": 4.0}}
            }}},
            "errors": {"doc_count": 1, "time_offset_split": {"buckets": {
                "0": {"doc_count": 1}, "86400000": {"doc_count": 0, "prev": {"value": null}}
            }}}
        }}}});
        let out = post_flight_transform(&response, &coll, &week()).into_owned();
        let buckets = out["aggregations"]["f"]["buckets"].as_object().unwrap();
        assert_eq!(buckets["ok"]["doc_count"], json!(1));
        assert_eq!(buckets["ok"]["doc_count_86400000"], json!(2));
        assert_eq!(buckets["ok"]["prev"]["value"], json!(4.0));
        assert_eq!(buckets["errors"]["doc_count_86400000"], json!(0));
    }

    #[test]
    fn test_unexpected_shape_passes_through() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("sum").with_id("prev").with_field("bytes").with_time_shift("1d")).unwrap();
        let response = json!({"aggregations": {"prev": 3}});
        let out = post_flight_transform(&response, &coll, &week()).into_owned();
        assert_eq!(out, response);
    }

    #[test]
    fn test_owner_matches_auxiliary_ids() {
        let mut coll = collection();
        coll.add(ColumnSpec::new("sum").with_id("1").with_field("bytes")).unwrap();
        coll.add(ColumnSpec::new("sum").with_id("10").with_field("bytes")).unwrap();
        coll.add(ColumnSpec::new("sum").with_id("1-a").with_field("bytes")).unwrap();
        let time = week();
        let columns = coll.request_columns();
        let merger = Merger {
            collection: &coll,
            split_index: split_position(&columns, &time),
            columns,
            range: time.time_range.as_ref(),
            shifts: Vec::new(),
        };
        assert_eq!(merger.owner("10").map(|(_, c)| c.id.as_str()), Some("10"));
        assert_eq!(merger.owner("1-metric").map(|(_, c)| c.id.as_str()), Some("1"));
        assert_eq!(merger.owner("1-a-metric").map(|(_, c)| c.id.as_str()), Some("1-a"));
        assert!(merger.owner("100").is_none());
    }
}
