//! Compiler error types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a time shift was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeShiftErrorReason {
    /// Shorter than the smallest date histogram interval
    TooSmall,
    /// Not a whole number of intervals
    NotAMultiple,
}

impl TimeShiftErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeShiftErrorReason::TooSmall => "tooSmall",
            TimeShiftErrorReason::NotAMultiple => "notAMultiple",
        }
    }
}

impl fmt::Display for TimeShiftErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that stop a collection from compiling
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Column '{column_id}' uses '{operation}', which needs a field")]
    MissingField { column_id: String, operation: String },

    #[error("Field '{field}' of column '{column_id}' not found in data view")]
    UnresolvedField { column_id: String, field: String },

    #[error("Operation '{operation}' of column '{column_id}' cannot be applied to field '{field}'")]
    FieldNotApplicable {
        column_id: String,
        operation: String,
        field: String,
    },

    #[error("Column '{column_id}' references unknown column '{reference}'")]
    UnresolvedReference { column_id: String, reference: String },

    /// A time shift is configured but no time range was given
    #[error("Time shifts require a time range")]
    MissingTimeRange,

    /// A time shift is configured but there is no time field to filter on
    #[error("Time shifts require a time field")]
    MissingTimeField,

    /// Shifts must be whole multiples of the smallest date histogram
    /// interval. Carries every column failing for `reason`.
    #[error("Invalid time shift ({reason}) on columns [{}]", .column_ids.join(", "))]
    InvalidTimeShift {
        reason: TimeShiftErrorReason,
        column_ids: Vec<String>,
    },

    /// Moving the time range back by the shift leaves the supported dates
    #[error("Time shift '{shift}' moves the time range outside the supported date range")]
    ShiftOutOfRange { shift: String },

    #[error("Time shifts cannot be combined with hierarchical metrics")]
    HierarchicalTimeShift,

    #[error("Column '{column_id}' needs a histogram or date histogram in the layer")]
    MissingHistogram { column_id: String },
}
