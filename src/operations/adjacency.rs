//! Adjacency metrics: values computed from neighbouring buckets of another
//! metric (cumulative sum, differences, moving average)

use serde_json::json;
use crate::collection::CollectionError;
use crate::column::{Column, MovingAverageParams, OperationParams, OperationType};
use crate::compiler::CompileError;
use crate::dsl::AggFragment;
use super::context::{BuildColumnArgs, DslContext};
use super::metrics;
use super::registry::definition;

pub(super) fn build(args: &BuildColumnArgs<'_>) -> Result<Column, CollectionError> {
    let reference = args
        .references
        .first()
        .ok_or_else(|| CollectionError::MissingReference {
            column_id: args.id.clone(),
            reference: String::new(),
        })?;
    if args.collection.by_id(reference).is_none() {
        return Err(CollectionError::MissingReference {
            column_id: args.id.clone(),
            reference: reference.clone(),
        });
    }
    let params = match args.operation {
        OperationType::MovingAverage => OperationParams::MovingAverage(MovingAverageParams {
            window: args.settings.moving_average_window,
        }),
        op => OperationParams::default_for(op)
            .ok_or_else(|| CollectionError::UnknownOperationType(op.to_string()))?,
    };
    Ok(Column::new(args.id.clone(), params).with_references(vec![reference.clone()]))
}

pub(super) fn label(column: &Column) -> String {
    let name = definition(column.operation_type()).display_name;
    match column.references.first() {
        Some(reference) => format!("{} of {}", name, reference),
        None => name.to_string(),
    }
}

pub(super) fn dsl(column: &Column, ctx: &DslContext<'_>) -> Result<AggFragment, CompileError> {
    let has_histogram = ctx.collection.request_columns().iter().any(|c| {
        matches!(
            c.operation_type(),
            OperationType::DateHistogram | OperationType::Histogram
        )
    });
    if !has_histogram {
        return Err(CompileError::MissingHistogram {
            column_id: column.id.clone(),
        });
    }

    let unresolved = |reference: &str| CompileError::UnresolvedReference {
        column_id: column.id.clone(),
        reference: reference.to_string(),
    };
    let reference_id = column.references.first().ok_or_else(|| unresolved(""))?;
    let referenced = ctx
        .collection
        .by_id(reference_id)
        .ok_or_else(|| unresolved(reference_id))?;
    let path = metrics::value_path(referenced).ok_or_else(|| unresolved(reference_id))?;

    let fragment = match &column.params {
        OperationParams::CumulativeSum => {
            AggFragment::clause("cumulative_sum", json!({ "buckets_path": path }))
        }
        OperationParams::Differences => {
            AggFragment::clause("derivative", json!({ "buckets_path": path }))
        }
        OperationParams::MovingAverage(params) => AggFragment::clause(
            "moving_fn",
            json!({
                "buckets_path": path,
                "window": params.window,
                "script": "MovingFunctions.unweightedAvg(values)",
            }),
        ),
        _ => return Ok(AggFragment::none()),
    };

    // A disabled input is not compiled on its own but must still exist
    // next to the pipeline aggregation reading it
    if referenced.enabled {
        return Ok(fragment);
    }
    let input = (definition(referenced.operation_type()).to_dsl)(referenced, ctx)?;
    Ok(fragment.with_parent(referenced.id.clone(), input))
}
