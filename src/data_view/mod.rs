//! Data view types (nouns)
//!
//! Field metadata supplied by the data-view provider. The pipeline only
//! ever reads these.

mod field;
mod types;

pub use field::{AggregationRestriction, DataView, Field};
pub use types::FieldType;
