//! Persisted column shape <-> typed column

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use super::error::CollectionError;
use crate::column::{Column, FilterRatioParams, OperationParams, OperationType, PersistedColumn};
use crate::time::TimeShift;

/// Stored params of a filter ratio: two full columns
#[derive(Debug, Deserialize, Serialize)]
struct PersistedRatio {
    numerator: PersistedColumn,
    denominator: PersistedColumn,
}

/// Validate a persisted column and turn it into a typed column with `id`
pub(crate) fn column_from_persisted(id: &str, persisted: &PersistedColumn) -> Result<Column, CollectionError> {
    let op: OperationType = persisted
        .operation_type
        .parse()
        .map_err(|_| CollectionError::UnknownOperationType(persisted.operation_type.clone()))?;
    let params = params_from_value(id, op, &persisted.params)?;

    let mut column = Column::new(id, params);
    if let Some(schema) = &persisted.schema {
        column.schema = schema.clone();
    }
    column.label = persisted.label.clone();
    column.enabled = persisted.enabled;
    column.source_field = persisted.source_field.clone();
    column.filter = persisted.filter.clone();
    column.references = persisted.references.clone();
    column.time_shift = match persisted.time_shift.as_deref() {
        Some(raw) => TimeShift::parse_optional(raw).map_err(|source| CollectionError::InvalidTimeShift {
            column_id: id.to_string(),
            source,
        })?,
        None => None,
    };
    Ok(column)
}

fn typed<T: DeserializeOwned>(id: &str, value: &Value) -> Result<T, CollectionError> {
    let value = if value.is_null() { json!({}) } else { value.clone() };
    serde_json::from_value(value).map_err(|source| CollectionError::InvalidParams {
        column_id: id.to_string(),
        source,
    })
}

fn params_from_value(id: &str, op: OperationType, value: &Value) -> Result<OperationParams, CollectionError> {
    Ok(match op {
        OperationType::Terms => OperationParams::Terms(typed(id, value)?),
        OperationType::DateHistogram => OperationParams::DateHistogram(typed(id, value)?),
        OperationType::Histogram => OperationParams::Histogram(typed(id, value)?),
        OperationType::Range => OperationParams::Range(typed(id, value)?),
        OperationType::Filters => OperationParams::Filters(typed(id, value)?),
        OperationType::Percentile => OperationParams::Percentile(typed(id, value)?),
        OperationType::LastValue => OperationParams::LastValue(typed(id, value)?),
        OperationType::MovingAverage => OperationParams::MovingAverage(typed(id, value)?),
        OperationType::FilterRatio => {
            let ratio: PersistedRatio = typed(id, value)?;
            let side = |suffix: &str, side: &PersistedColumn| {
                let side_id = side.id.clone().unwrap_or_else(|| format!("{}-{}", id, suffix));
                column_from_persisted(&side_id, side).map(Box::new)
            };
            OperationParams::FilterRatio(FilterRatioParams {
                numerator: side("numerator", &ratio.numerator)?,
                denominator: side("denominator", &ratio.denominator)?,
            })
        }
        // Params-free operations ignore whatever was stored
        op => OperationParams::default_for(op)
            .ok_or_else(|| CollectionError::UnknownOperationType(op.to_string()))?,
    })
}

fn params_to_value(params: &OperationParams) -> Value {
    let value = match params {
        OperationParams::Terms(p) => serde_json::to_value(p),
        OperationParams::DateHistogram(p) => serde_json::to_value(p),
        OperationParams::Histogram(p) => serde_json::to_value(p),
        OperationParams::Range(p) => serde_json::to_value(p),
        OperationParams::Filters(p) => serde_json::to_value(p),
        OperationParams::Percentile(p) => serde_json::to_value(p),
        OperationParams::LastValue(p) => serde_json::to_value(p),
        OperationParams::MovingAverage(p) => serde_json::to_value(p),
        OperationParams::FilterRatio(p) => serde_json::to_value(PersistedRatio {
            numerator: column_to_persisted(&p.numerator, true),
            denominator: column_to_persisted(&p.denominator, true),
        }),
        _ => return Value::Null,
    };
    value.unwrap_or(Value::Null)
}

/// Persisted form of a column. Layer entries leave the id to the map key;
/// embedded sub-columns keep it.
pub(crate) fn column_to_persisted(column: &Column, with_id: bool) -> PersistedColumn {
    let default_schema = column.group().default_schema();
    PersistedColumn {
        id: with_id.then(|| column.id.clone()),
        operation_type: column.operation_type().as_str().to_string(),
        label: column.label.clone(),
        schema: (column.schema != default_schema).then(|| column.schema.clone()),
        enabled: column.enabled,
        source_field: column.source_field.clone(),
        time_shift: column.time_shift.map(|s| s.to_string()),
        filter: column.filter.clone(),
        references: column.references.clone(),
        params: params_to_value(&column.params),
    }
}
