//! Field and data view definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use super::types::FieldType;
use crate::error::ParseError;

/// Per-field restriction on how an operation may aggregate it
///
/// Rolled-up fields only support the aggregations they were rolled up with,
/// and date histograms on them must use the stored interval.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AggregationRestriction {
    pub interval: Option<f64>,
    pub fixed_interval: Option<String>,
    pub calendar_interval: Option<String>,
    pub time_zone: Option<String>,
}

impl AggregationRestriction {
    /// The date interval this restriction pins a date histogram to
    pub fn date_interval(&self) -> Option<&str> {
        self.fixed_interval
            .as_deref()
            .or(self.calendar_interval.as_deref())
    }
}

/// A field in a data view
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_true")]
    pub aggregatable: bool,
    #[serde(default = "default_true")]
    pub searchable: bool,
    /// Operation name -> restriction. `None` means unrestricted.
    #[serde(default)]
    pub aggregation_restrictions: Option<HashMap<String, AggregationRestriction>>,
}

fn default_true() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            aggregatable: true,
            searchable: true,
            aggregation_restrictions: None,
        }
    }

    pub fn with_restriction(mut self, operation: impl Into<String>, restriction: AggregationRestriction) -> Self {
        self.aggregation_restrictions
            .get_or_insert_with(HashMap::new)
            .insert(operation.into(), restriction);
        self
    }

    pub fn not_aggregatable(mut self) -> Self {
        self.aggregatable = false;
        self
    }

    /// Check whether restrictions (if any) allow the named operation
    pub fn allows_operation(&self, operation: &str) -> bool {
        match &self.aggregation_restrictions {
            Some(restrictions) => restrictions.contains_key(operation),
            None => true,
        }
    }

    pub fn restriction(&self, operation: &str) -> Option<&AggregationRestriction> {
        self.aggregation_restrictions.as_ref()?.get(operation)
    }
}

/// A data view ("index pattern") - the field catalogue columns are built on
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataView {
    pub id: String,
    pub title: String,
    /// Default time field used for time filters and time shifts
    pub time_field_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl DataView {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            time_field_name: None,
            fields: Vec::new(),
        }
    }

    pub fn with_time_field(mut self, name: impl Into<String>) -> Self {
        self.time_field_name = Some(name.into());
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Load a data view from a YAML (or JSON) file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        crate::parser::parse_data_view_file(path)
    }

    /// Get a field by name
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The configured time field, if it exists in the field list
    pub fn time_field(&self) -> Option<&Field> {
        self.time_field_name.as_deref().and_then(|n| self.get_field(n))
    }

    pub fn aggregatable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.aggregatable)
    }
}
