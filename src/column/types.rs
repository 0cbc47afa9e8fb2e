//! Operation type tags

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pseudo field name persisted layers use for "count of documents"
pub const DOCUMENT_FIELD: &str = "___records___";

/// Whether an aggregation partitions documents or computes a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggGroup {
    Buckets,
    Metrics,
}

impl AggGroup {
    /// The schema role a column of this group gets when none is given
    pub fn default_schema(&self) -> &'static str {
        match self {
            AggGroup::Buckets => "bucket",
            AggGroup::Metrics => "metric",
        }
    }
}

impl fmt::Display for AggGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggGroup::Buckets => f.write_str("buckets"),
            AggGroup::Metrics => f.write_str("metrics"),
        }
    }
}

/// Every operation the pipeline knows. The set is closed; adding one means
/// adding a variant here and an entry in the operation registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Terms,
    DateHistogram,
    Histogram,
    Range,
    Filters,
    Count,
    Sum,
    Average,
    Min,
    Max,
    Median,
    UniqueCount,
    Percentile,
    LastValue,
    FilterRatio,
    CumulativeSum,
    Differences,
    MovingAverage,
}

impl OperationType {
    pub const ALL: [OperationType; 18] = [
        OperationType::Terms,
        OperationType::DateHistogram,
        OperationType::Histogram,
        OperationType::Range,
        OperationType::Filters,
        OperationType::Count,
        OperationType::Sum,
        OperationType::Average,
        OperationType::Min,
        OperationType::Max,
        OperationType::Median,
        OperationType::UniqueCount,
        OperationType::Percentile,
        OperationType::LastValue,
        OperationType::FilterRatio,
        OperationType::CumulativeSum,
        OperationType::Differences,
        OperationType::MovingAverage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Terms => "terms",
            OperationType::DateHistogram => "date_histogram",
            OperationType::Histogram => "histogram",
            OperationType::Range => "range",
            OperationType::Filters => "filters",
            OperationType::Count => "count",
            OperationType::Sum => "sum",
            OperationType::Average => "average",
            OperationType::Min => "min",
            OperationType::Max => "max",
            OperationType::Median => "median",
            OperationType::UniqueCount => "unique_count",
            OperationType::Percentile => "percentile",
            OperationType::LastValue => "last_value",
            OperationType::FilterRatio => "filter_ratio",
            OperationType::CumulativeSum => "cumulative_sum",
            OperationType::Differences => "differences",
            OperationType::MovingAverage => "moving_average",
        }
    }

    pub fn group(&self) -> AggGroup {
        match self {
            OperationType::Terms
            | OperationType::DateHistogram
            | OperationType::Histogram
            | OperationType::Range
            | OperationType::Filters => AggGroup::Buckets,
            _ => AggGroup::Metrics,
        }
    }

    /// Parent-pipeline metrics that read the previous buckets of a histogram
    pub fn is_adjacency(&self) -> bool {
        matches!(
            self,
            OperationType::CumulativeSum | OperationType::Differences | OperationType::MovingAverage
        )
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an operation tag that is not in the registry
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unknown operation type '{0}'")]
pub struct ParseOperationTypeError(pub String);

impl FromStr for OperationType {
    type Err = ParseOperationTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationType::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ParseOperationTypeError(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OperationType::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for OperationType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
