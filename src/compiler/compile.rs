//! Collection -> aggregation request tree
//!
//! The tree is rebuilt from scratch on every call. Columns are laid out in
//! request order (buckets, then metrics). Each bucket becomes the parent
//! scope of everything after it, unless nothing after it emits DSL; the
//! time-shift split, when present, is inserted once at a fixed position of
//! that chain.

use serde_json::{Map, Value};
use tracing::debug;
use super::error::CompileError;
use super::time_shift::{split_body, validate_time_shifts};
use crate::collection::ColumnCollection;
use crate::column::Column;
use crate::dsl::{AggFragment, RequestTree, TIME_SHIFT_SPLIT_ID};
use crate::operations::{definition, DslContext};
use crate::time::TimeContext;

/// Compile-time switches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOptions {
    /// Repeat metrics inside every bucket level, not just the innermost
    pub hierarchical: bool,
}

/// Compile the enabled columns of `collection` into a request tree
pub fn compile(
    collection: &ColumnCollection,
    time: &TimeContext,
    options: &CompileOptions,
) -> Result<RequestTree, CompileError> {
    let columns = collection.request_columns();
    let has_time_shifts = columns.iter().any(|c| c.has_time_shift());
    if has_time_shifts && options.hierarchical {
        return Err(CompileError::HierarchicalTimeShift);
    }

    let ctx = DslContext {
        collection,
        time,
        settings: collection.settings(),
        has_time_shifts,
    };
    let shifts = validate_time_shifts(&ctx, &columns)?;

    let fragments = columns
        .iter()
        .map(|c| (definition(c.operation_type()).to_dsl)(c, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let split = if shifts.is_empty() {
        None
    } else {
        Some((split_position(&columns, time), split_body(&ctx, &shifts)?))
    };

    let layout = Layout {
        columns: &columns,
        fragments: &fragments,
        split: split.as_ref(),
        hierarchical: options.hierarchical,
    };
    let tree = layout.scope(0);
    debug!(
        columns = columns.len(),
        shifts = shifts.len(),
        split_at = ?split.as_ref().map(|(i, _)| *i),
        "Compiled request"
    );
    Ok(tree)
}

/// The split goes directly above the first date histogram on a time field,
/// else directly above the first metric
pub(crate) fn split_position(columns: &[&Column], time: &TimeContext) -> usize {
    columns
        .iter()
        .position(|c| {
            definition(c.operation_type())
                .bucket
                .as_ref()
                .is_some_and(|b| (b.splits_for_time_shift)(c, time))
        })
        .or_else(|| columns.iter().position(|c| c.is_metric()))
        .unwrap_or(columns.len())
}

struct Layout<'a> {
    columns: &'a [&'a Column],
    fragments: &'a [AggFragment],
    split: Option<&'a (usize, Map<String, Value>)>,
    hierarchical: bool,
}

impl<'a> Layout<'a> {
    /// The scope holding column `start` and everything after it
    fn scope(&self, start: usize) -> Map<String, Value> {
        match self.split {
            Some((at, body)) if *at == start => {
                let mut body = body.clone();
                let inner = self.chain(start);
                if !inner.is_empty() {
                    body.insert("aggs".into(), Value::Object(inner));
                }
                let mut scope = Map::new();
                scope.insert(TIME_SHIFT_SPLIT_ID.to_string(), Value::Object(body));
                scope
            }
            _ => self.chain(start),
        }
    }

    fn chain(&self, start: usize) -> Map<String, Value> {
        let mut scope = Map::new();
        for index in start..self.columns.len() {
            let column = self.columns[index];
            let fragment = &self.fragments[index];
            if !column.is_bucket() {
                fragment.write_into(&column.id, &mut scope);
                continue;
            }

            for (parent_id, parent) in &fragment.parent_aggs {
                parent.write_into(parent_id, &mut scope);
            }
            let mut body = fragment.body.clone().unwrap_or_default();
            if self.opens_scope(index) {
                let mut child = self.scope(index + 1);
                if self.hierarchical {
                    self.write_metrics(&mut child);
                }
                merge_aggs(&mut body, child);
                scope.insert(column.id.clone(), Value::Object(body));
                // Everything after this bucket now lives inside it
                return scope;
            }
            scope.insert(column.id.clone(), Value::Object(body));
        }
        scope
    }

    /// A bucket nests the rest of the chain when something after it
    /// produces DSL or the split sits below it
    fn opens_scope(&self, index: usize) -> bool {
        let split_below = self.split.is_some_and(|(at, _)| *at > index);
        split_below || self.fragments[index + 1..].iter().any(|f| !f.is_empty())
    }

    fn write_metrics(&self, scope: &mut Map<String, Value>) {
        for (column, fragment) in self.columns.iter().zip(self.fragments) {
            if column.is_metric() && !fragment.is_empty() {
                fragment.write_into(&column.id, scope);
            }
        }
    }
}

/// Add `child` to the bucket's `aggs`, keeping aggregations the bucket
/// already carries (terms ordering metrics)
fn merge_aggs(body: &mut Map<String, Value>, child: Map<String, Value>) {
    if child.is_empty() {
        return;
    }
    match body.get_mut("aggs") {
        Some(Value::Object(existing)) => existing.extend(child),
        _ => {
            body.insert("aggs".into(), Value::Object(child));
        }
    }
}
