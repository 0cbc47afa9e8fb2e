//! The static operation table

use serde_json::Value;
use std::cmp::Ordering;
use crate::collection::{ColumnCollection, CollectionError};
use crate::column::{Column, OperationType};
use crate::compiler::CompileError;
use crate::data_view::{DataView, Field};
use crate::dsl::AggFragment;
use crate::time::{ResolvedShift, TimeContext};
use super::context::{BuildColumnArgs, DslContext};
use super::{adjacency, buckets, metrics};

/// What an operation reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationInput {
    /// Documents only (filters, document count)
    None,
    /// A data view field
    Field,
    /// Other columns of the same collection
    References,
}

/// Hooks only bucket operations have
pub struct BucketBehavior {
    /// Whether the time-shift split goes directly above this bucket
    pub splits_for_time_shift: fn(&Column, &TimeContext) -> bool,
    /// Bucket width time shifts must be a multiple of
    pub time_shift_interval_ms: fn(&Column, &DslContext<'_>) -> Option<i64>,
    /// Whether keys stay on the bucket grid when moved by calendar months
    pub calendar_aligned: fn(&Column, &DslContext<'_>) -> bool,
    /// Map a key from a shifted branch into the baseline's key space
    pub shifted_key: fn(&Value, &ResolvedShift) -> Value,
    /// Engine ordering of merged buckets, given `(map key, bucket)` pairs
    pub order_buckets: fn(&Column, &ColumnCollection, (&str, &Value), (&str, &Value)) -> Ordering,
}

/// Behavior bundle for one operation type
pub struct OperationDefinition {
    pub operation: OperationType,
    pub display_name: &'static str,
    pub input: OperationInput,
    pub applies_to_documents: bool,
    pub applies_to_field: fn(&Field) -> bool,
    pub build_column: fn(&BuildColumnArgs<'_>) -> Result<Column, CollectionError>,
    pub default_label: fn(&Column) -> String,
    pub to_dsl: fn(&Column, &DslContext<'_>) -> Result<AggFragment, CompileError>,
    /// `(column, current data view, target data view)`
    pub is_transferable: fn(&Column, &DataView, &DataView) -> bool,
    /// Adjust this column after another column in the collection changed
    pub on_other_column_changed: Option<fn(&Column, &ColumnCollection) -> Option<Column>>,
    pub bucket: Option<BucketBehavior>,
}

impl OperationDefinition {
    /// Type and aggregatability check plus the field's restriction list
    pub fn applies_to(&self, field: &Field) -> bool {
        (self.applies_to_field)(field) && field.allows_operation(self.operation.as_str())
    }
}

/// Look up the behavior bundle for an operation
pub fn definition(op: OperationType) -> &'static OperationDefinition {
    // OPERATIONS is laid out in `OperationType::ALL` order
    &OPERATIONS[op as usize]
}

fn no_field(_field: &Field) -> bool {
    false
}

fn always_transferable(_column: &Column, _from: &DataView, _to: &DataView) -> bool {
    true
}

/// Default for field operations: the target has an applicable field of the
/// same name
pub(super) fn transfer_by_field(column: &Column, _from: &DataView, to: &DataView) -> bool {
    let Some(name) = column.field() else {
        return definition(column.operation_type()).applies_to_documents;
    };
    to.get_field(name)
        .is_some_and(|f| definition(column.operation_type()).applies_to(f))
}

static OPERATIONS: [OperationDefinition; 18] = [
    OperationDefinition {
        operation: OperationType::Terms,
        display_name: "Top values",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: buckets::terms_applies,
        build_column: buckets::terms_build,
        default_label: buckets::terms_label,
        to_dsl: buckets::terms_dsl,
        is_transferable: buckets::terms_transferable,
        on_other_column_changed: Some(buckets::terms_on_other_column_changed),
        bucket: Some(BucketBehavior {
            splits_for_time_shift: buckets::never_splits,
            time_shift_interval_ms: buckets::no_interval,
            calendar_aligned: buckets::always_aligned,
            shifted_key: buckets::same_key,
            order_buckets: buckets::terms_order,
        }),
    },
    OperationDefinition {
        operation: OperationType::DateHistogram,
        display_name: "Date histogram",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: buckets::date_histogram_applies,
        build_column: buckets::date_histogram_build,
        default_label: buckets::field_label,
        to_dsl: buckets::date_histogram_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: Some(BucketBehavior {
            splits_for_time_shift: buckets::date_histogram_splits,
            time_shift_interval_ms: buckets::date_histogram_interval_ms,
            calendar_aligned: buckets::date_histogram_calendar_aligned,
            shifted_key: buckets::date_histogram_shifted_key,
            order_buckets: buckets::key_order,
        }),
    },
    OperationDefinition {
        operation: OperationType::Histogram,
        display_name: "Intervals",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: buckets::histogram_applies,
        build_column: buckets::histogram_build,
        default_label: buckets::field_label,
        to_dsl: buckets::histogram_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: Some(BucketBehavior {
            splits_for_time_shift: buckets::never_splits,
            time_shift_interval_ms: buckets::no_interval,
            calendar_aligned: buckets::always_aligned,
            shifted_key: buckets::same_key,
            order_buckets: buckets::key_order,
        }),
    },
    OperationDefinition {
        operation: OperationType::Range,
        display_name: "Ranges",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: buckets::range_applies,
        build_column: buckets::range_build,
        default_label: buckets::field_label,
        to_dsl: buckets::range_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: Some(BucketBehavior {
            splits_for_time_shift: buckets::never_splits,
            time_shift_interval_ms: buckets::no_interval,
            calendar_aligned: buckets::always_aligned,
            shifted_key: buckets::same_key,
            order_buckets: buckets::range_order,
        }),
    },
    OperationDefinition {
        operation: OperationType::Filters,
        display_name: "Filters",
        input: OperationInput::None,
        applies_to_documents: true,
        applies_to_field: no_field,
        build_column: buckets::filters_build,
        default_label: buckets::filters_label,
        to_dsl: buckets::filters_dsl,
        is_transferable: always_transferable,
        on_other_column_changed: None,
        bucket: Some(BucketBehavior {
            splits_for_time_shift: buckets::never_splits,
            time_shift_interval_ms: buckets::no_interval,
            calendar_aligned: buckets::always_aligned,
            shifted_key: buckets::same_key,
            order_buckets: buckets::filters_order,
        }),
    },
    OperationDefinition {
        operation: OperationType::Count,
        display_name: "Count",
        input: OperationInput::Field,
        applies_to_documents: true,
        applies_to_field: metrics::count_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::count_label,
        to_dsl: metrics::count_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::Sum,
        display_name: "Sum",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::numeric_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::field_metric_label,
        to_dsl: metrics::field_metric_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::Average,
        display_name: "Average",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::numeric_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::field_metric_label,
        to_dsl: metrics::field_metric_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::Min,
        display_name: "Minimum",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::numeric_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::field_metric_label,
        to_dsl: metrics::field_metric_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::Max,
        display_name: "Maximum",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::numeric_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::field_metric_label,
        to_dsl: metrics::field_metric_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::Median,
        display_name: "Median",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::numeric_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::field_metric_label,
        to_dsl: metrics::percentiles_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::UniqueCount,
        display_name: "Unique count",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::unique_count_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::field_metric_label,
        to_dsl: metrics::field_metric_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::Percentile,
        display_name: "Percentile",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::numeric_applies,
        build_column: metrics::field_metric_build,
        default_label: metrics::percentile_label,
        to_dsl: metrics::percentiles_dsl,
        is_transferable: transfer_by_field,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::LastValue,
        display_name: "Last value",
        input: OperationInput::Field,
        applies_to_documents: false,
        applies_to_field: metrics::last_value_applies,
        build_column: metrics::last_value_build,
        default_label: metrics::field_metric_label,
        to_dsl: metrics::last_value_dsl,
        is_transferable: metrics::last_value_transferable,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::FilterRatio,
        display_name: "Filter ratio",
        input: OperationInput::None,
        applies_to_documents: true,
        applies_to_field: no_field,
        build_column: metrics::filter_ratio_build,
        default_label: metrics::filter_ratio_label,
        to_dsl: metrics::filter_ratio_dsl,
        is_transferable: metrics::filter_ratio_transferable,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::CumulativeSum,
        display_name: "Cumulative sum",
        input: OperationInput::References,
        applies_to_documents: false,
        applies_to_field: no_field,
        build_column: adjacency::build,
        default_label: adjacency::label,
        to_dsl: adjacency::dsl,
        is_transferable: always_transferable,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::Differences,
        display_name: "Differences",
        input: OperationInput::References,
        applies_to_documents: false,
        applies_to_field: no_field,
        build_column: adjacency::build,
        default_label: adjacency::label,
        to_dsl: adjacency::dsl,
        is_transferable: always_transferable,
        on_other_column_changed: None,
        bucket: None,
    },
    OperationDefinition {
        operation: OperationType::MovingAverage,
        display_name: "Moving average",
        input: OperationInput::References,
        applies_to_documents: false,
        applies_to_field: no_field,
        build_column: adjacency::build,
        default_label: adjacency::label,
        to_dsl: adjacency::dsl,
        is_transferable: always_transferable,
        on_other_column_changed: None,
        bucket: None,
    },
];
