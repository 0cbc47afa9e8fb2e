//! Column types (nouns)
//!
//! A column is one bucket or metric aggregation definition. Its operation
//! type is carried by the params variant, so the two can never disagree.

mod column;
mod params;
mod persisted;
mod types;

pub use column::Column;
pub use params::{
    DateHistogramParams, FilterRatioParams, FilterSpec, FiltersParams, HistogramParams,
    LastValueParams, MovingAverageParams, OperationParams, PercentileParams, RangeParams,
    RangeSpec, SortDirection, TermsOrderBy, TermsParams,
};
pub use persisted::{ColumnSpec, PersistedColumn, PersistedLayer};
pub use types::{AggGroup, OperationType, ParseOperationTypeError, DOCUMENT_FIELD};
