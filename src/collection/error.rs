//! Collection error types

use thiserror::Error;
use crate::time::ParseTimeShiftError;

/// Errors raised while building or mutating a column collection
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The operation tag is not in the registry
    #[error("Unknown operation type '{0}'")]
    UnknownOperationType(String),

    #[error("Column id '{0}' already exists in the collection")]
    DuplicateColumnId(String),

    /// Params did not match the operation's params shape
    #[error("Invalid params for column '{column_id}': {source}")]
    InvalidParams {
        column_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid time shift on column '{column_id}': {source}")]
    InvalidTimeShift {
        column_id: String,
        #[source]
        source: ParseTimeShiftError,
    },

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Field '{0}' not found in data view")]
    FieldNotFound(String),

    #[error("Operation '{operation}' requires a field")]
    FieldRequired { operation: String },

    #[error("Operation '{operation}' cannot be applied to field '{field}'")]
    FieldNotApplicable { operation: String, field: String },

    /// An adjacency metric points at a column that does not exist
    #[error("Column '{column_id}' references missing column '{reference}'")]
    MissingReference { column_id: String, reference: String },

    #[error("Data view has no time field")]
    MissingTimeField,
}
