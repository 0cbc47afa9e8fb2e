//! Inputs handed to registry functions

use crate::collection::{CollectionError, ColumnCollection};
use crate::column::{Column, OperationType};
use crate::compiler::CompileError;
use crate::config::PipelineSettings;
use crate::data_view::{DataView, Field};
use crate::time::{TimeContext, TimeRange};
use super::registry::definition;

/// Everything an operation needs to emit its DSL
pub struct DslContext<'a> {
    pub collection: &'a ColumnCollection,
    pub time: &'a TimeContext,
    pub settings: &'a PipelineSettings,
    /// Any enabled metric carries a time shift
    pub has_time_shifts: bool,
}

impl<'a> DslContext<'a> {
    pub fn data_view(&self) -> &'a DataView {
        self.collection.data_view()
    }

    /// Resolve the column's field and check the operation accepts it
    pub fn require_field(&self, column: &Column) -> Result<&'a Field, CompileError> {
        let name = column.field().ok_or_else(|| CompileError::MissingField {
            column_id: column.id.clone(),
            operation: column.operation_type().to_string(),
        })?;
        let field = self
            .data_view()
            .get_field(name)
            .ok_or_else(|| CompileError::UnresolvedField {
                column_id: column.id.clone(),
                field: name.to_string(),
            })?;
        if !definition(column.operation_type()).applies_to(field) {
            return Err(CompileError::FieldNotApplicable {
                column_id: column.id.clone(),
                operation: column.operation_type().to_string(),
                field: name.to_string(),
            });
        }
        Ok(field)
    }

    /// Bounds for histograms: the column's propagated range, else the
    /// context's
    pub fn bounds_for(&self, propagated: Option<&'a TimeRange>) -> Option<&'a TimeRange> {
        propagated.or(self.time.time_range.as_ref())
    }
}

/// Everything a column builder needs
pub struct BuildColumnArgs<'a> {
    pub operation: OperationType,
    pub id: String,
    pub field: Option<&'a Field>,
    pub collection: &'a ColumnCollection,
    pub settings: &'a PipelineSettings,
    /// Referenced column ids for adjacency metrics
    pub references: Vec<String>,
}

impl<'a> BuildColumnArgs<'a> {
    pub fn data_view(&self) -> &'a DataView {
        self.collection.data_view()
    }

    pub fn field_name(&self) -> Option<&'a str> {
        self.field.map(|f| f.name.as_str())
    }

    pub fn require_field(&self) -> Result<&'a Field, CollectionError> {
        self.field.ok_or_else(|| CollectionError::FieldRequired {
            operation: self.operation.to_string(),
        })
    }
}
