//! The column definition

use serde_json::Value;
use super::params::OperationParams;
use super::types::{AggGroup, OperationType};
use crate::time::TimeShift;

/// One bucket or metric aggregation in a collection
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Unique within its collection; also the aggregation id in the request
    pub id: String,
    pub label: Option<String>,
    /// Role in the visualization (`bucket`, `metric`, `segment`, ...)
    pub schema: String,
    pub enabled: bool,
    /// Field the operation reads. `None` for operations without a field and
    /// for document counts.
    pub source_field: Option<String>,
    /// Only meaningful on metrics
    pub time_shift: Option<TimeShift>,
    /// Engine query clause scoping a metric
    pub filter: Option<Value>,
    /// Column ids read by adjacency metrics
    pub references: Vec<String>,
    pub params: OperationParams,
}

impl Column {
    pub fn new(id: impl Into<String>, params: OperationParams) -> Self {
        let group = params.operation_type().group();
        Self {
            id: id.into(),
            label: None,
            schema: group.default_schema().to_string(),
            enabled: true,
            source_field: None,
            time_shift: None,
            filter: None,
            references: Vec::new(),
            params,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.source_field = Some(field.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_time_shift(mut self, shift: TimeShift) -> Self {
        self.time_shift = Some(shift);
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn operation_type(&self) -> OperationType {
        self.params.operation_type()
    }

    pub fn group(&self) -> AggGroup {
        self.operation_type().group()
    }

    pub fn is_bucket(&self) -> bool {
        self.group() == AggGroup::Buckets
    }

    pub fn is_metric(&self) -> bool {
        self.group() == AggGroup::Metrics
    }

    /// Count of documents rather than of field values
    pub fn is_document_count(&self) -> bool {
        matches!(self.params, OperationParams::Count) && self.source_field.is_none()
    }

    pub fn field(&self) -> Option<&str> {
        self.source_field.as_deref()
    }

    pub fn has_time_shift(&self) -> bool {
        self.is_metric() && self.time_shift.is_some()
    }

    /// Columns embedded in this column's params
    pub fn sub_columns(&self) -> Vec<&Column> {
        match &self.params {
            OperationParams::FilterRatio(p) => vec![p.numerator.as_ref(), p.denominator.as_ref()],
            _ => Vec::new(),
        }
    }

    pub fn sub_columns_mut(&mut self) -> Vec<&mut Column> {
        match &mut self.params {
            OperationParams::FilterRatio(p) => vec![p.numerator.as_mut(), p.denominator.as_mut()],
            _ => Vec::new(),
        }
    }

    /// Apply `f` to this column and every nested sub-column, parents first
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Column)) {
        f(self);
        for sub in self.sub_columns_mut() {
            sub.walk_mut(f);
        }
    }
}
