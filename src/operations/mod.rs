//! Operation definition registry (verb module)
//!
//! A static table from operation tag to a bundle of behavior functions.
//! Callers look up `definition(op)` and call through the bundle; there is
//! no trait object or per-operation type.

mod adjacency;
mod buckets;
mod context;
mod metrics;
mod registry;

pub use context::{BuildColumnArgs, DslContext};
pub use registry::{definition, BucketBehavior, OperationDefinition, OperationInput};

/// Path a sibling aggregation uses to read a metric column's value.
/// `None` for metrics that cannot be read that way.
pub fn metric_path(column: &crate::column::Column) -> Option<String> {
    metrics::value_path(column)
}

/// Whether buckets can be ordered by this column
pub fn is_sortable_metric(column: &crate::column::Column) -> bool {
    metrics::is_sortable(column)
}
