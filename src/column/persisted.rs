//! Persisted column shapes
//!
//! Plain serde records stored inside a larger visualization document.
//! Params stay free-form JSON here and are validated when a collection
//! loads them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A column as stored, and as handed to `ColumnCollection::add`
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PersistedColumn {
    /// Omitted inside a layer, where the map key is the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub operation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_shift: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

fn default_enabled() -> bool {
    true
}

/// Input to `ColumnCollection::add`
pub type ColumnSpec = PersistedColumn;

impl PersistedColumn {
    pub fn new(operation_type: impl Into<String>) -> Self {
        Self {
            operation_type: operation_type.into(),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.source_field = Some(field.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_time_shift(mut self, shift: impl Into<String>) -> Self {
        self.time_shift = Some(shift.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
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
}

/// All columns of one visualization layer
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PersistedLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_view_id: Option<String>,
    /// Column ids in collection order
    #[serde(default)]
    pub column_order: Vec<String>,
    #[serde(default)]
    pub columns: BTreeMap<String, PersistedColumn>,
}
