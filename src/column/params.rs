//! Operation-specific column parameters

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use super::column::Column;
use super::types::OperationType;
use crate::time::{DateInterval, TimeRange};

/// Sort direction for ordered buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// What a terms column is ordered by
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TermsOrderBy {
    /// Order by the bucket key
    #[default]
    Alphabetical,
    /// Order by the value of another (metric) column
    Column { column_id: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TermsParams {
    pub size: u32,
    pub order_by: TermsOrderBy,
    pub order_direction: SortDirection,
    /// Emit a bucket for documents without a value
    pub missing_bucket: bool,
}

impl Default for TermsParams {
    fn default() -> Self {
        Self {
            size: 3,
            order_by: TermsOrderBy::Alphabetical,
            order_direction: SortDirection::Asc,
            missing_bucket: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DateHistogramParams {
    pub interval: DateInterval,
    pub time_zone: Option<String>,
    /// Emit empty buckets across the whole time range
    pub include_empty_rows: bool,
    pub drop_partials: bool,
    /// Time range propagated from the collection; runtime only
    #[serde(skip)]
    pub bounds: Option<TimeRange>,
}

impl Default for DateHistogramParams {
    fn default() -> Self {
        Self {
            interval: DateInterval::Auto,
            time_zone: None,
            include_empty_rows: true,
            drop_partials: false,
            bounds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistogramParams {
    pub interval: f64,
    pub include_empty_rows: bool,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            interval: 1.0,
            include_empty_rows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RangeSpec {
    #[serde(default)]
    pub from: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RangeParams {
    pub ranges: Vec<RangeSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterSpec {
    pub label: String,
    /// Engine query clause
    pub query: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FiltersParams {
    pub filters: Vec<FilterSpec>,
}

impl Default for FiltersParams {
    fn default() -> Self {
        Self {
            filters: vec![FilterSpec {
                label: "All records".to_string(),
                query: json!({ "match_all": {} }),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PercentileParams {
    pub percentile: f64,
}

impl Default for PercentileParams {
    fn default() -> Self {
        Self { percentile: 95.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LastValueParams {
    pub sort_field: String,
}

/// Ratio of two filtered metrics; both sides are full sub-columns
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRatioParams {
    pub numerator: Box<Column>,
    pub denominator: Box<Column>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MovingAverageParams {
    pub window: u32,
}

impl Default for MovingAverageParams {
    fn default() -> Self {
        Self { window: 5 }
    }
}

/// Typed params, one variant per operation type
#[derive(Debug, Clone, PartialEq)]
pub enum OperationParams {
    Terms(TermsParams),
    DateHistogram(DateHistogramParams),
    Histogram(HistogramParams),
    Range(RangeParams),
    Filters(FiltersParams),
    Count,
    Sum,
    Average,
    Min,
    Max,
    Median,
    UniqueCount,
    Percentile(PercentileParams),
    LastValue(LastValueParams),
    FilterRatio(FilterRatioParams),
    CumulativeSum,
    Differences,
    MovingAverage(MovingAverageParams),
}

impl OperationParams {
    pub fn operation_type(&self) -> OperationType {
        match self {
            OperationParams::Terms(_) => OperationType::Terms,
            OperationParams::DateHistogram(_) => OperationType::DateHistogram,
            OperationParams::Histogram(_) => OperationType::Histogram,
            OperationParams::Range(_) => OperationType::Range,
            OperationParams::Filters(_) => OperationType::Filters,
            OperationParams::Count => OperationType::Count,
            OperationParams::Sum => OperationType::Sum,
            OperationParams::Average => OperationType::Average,
            OperationParams::Min => OperationType::Min,
            OperationParams::Max => OperationType::Max,
            OperationParams::Median => OperationType::Median,
            OperationParams::UniqueCount => OperationType::UniqueCount,
            OperationParams::Percentile(_) => OperationType::Percentile,
            OperationParams::LastValue(_) => OperationType::LastValue,
            OperationParams::FilterRatio(_) => OperationType::FilterRatio,
            OperationParams::CumulativeSum => OperationType::CumulativeSum,
            OperationParams::Differences => OperationType::Differences,
            OperationParams::MovingAverage(_) => OperationType::MovingAverage,
        }
    }

    /// Defaults for an operation; `None` where a required param has no
    /// sensible default (last value needs a sort field, filter ratio needs
    /// its sub-columns)
    pub fn default_for(op: OperationType) -> Option<OperationParams> {
        Some(match op {
            OperationType::Terms => OperationParams::Terms(TermsParams::default()),
            OperationType::DateHistogram => OperationParams::DateHistogram(DateHistogramParams::default()),
            OperationType::Histogram => OperationParams::Histogram(HistogramParams::default()),
            OperationType::Range => OperationParams::Range(RangeParams::default()),
            OperationType::Filters => OperationParams::Filters(FiltersParams::default()),
            OperationType::Count => OperationParams::Count,
            OperationType::Sum => OperationParams::Sum,
            OperationType::Average => OperationParams::Average,
            OperationType::Min => OperationParams::Min,
            OperationType::Max => OperationParams::Max,
            OperationType::Median => OperationParams::Median,
            OperationType::UniqueCount => OperationParams::UniqueCount,
            OperationType::Percentile => OperationParams::Percentile(PercentileParams::default()),
            OperationType::CumulativeSum => OperationParams::CumulativeSum,
            OperationType::Differences => OperationParams::Differences,
            OperationType::MovingAverage => OperationParams::MovingAverage(MovingAverageParams::default()),
            OperationType::LastValue | OperationType::FilterRatio => return None,
        })
    }
}
