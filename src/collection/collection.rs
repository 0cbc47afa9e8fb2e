//! The column collection

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};
use super::convert::{column_from_persisted, column_to_persisted};
use super::error::CollectionError;
use crate::column::{AggGroup, Column, ColumnSpec, OperationParams, OperationType, PersistedLayer};
use crate::config::PipelineSettings;
use crate::data_view::DataView;
use crate::operations::{definition, BuildColumnArgs, OperationInput};
use crate::time::{ResolvedShift, TimeContext, TimeRange};

/// Ordered columns of one visualization layer over one data view
///
/// Columns are shared (`Arc`) so cheap clones can be derived for scoped
/// compiles; mutation goes through copy-on-write.
#[derive(Debug, Clone)]
pub struct ColumnCollection {
    data_view: Arc<DataView>,
    settings: Arc<PipelineSettings>,
    columns: Vec<Arc<Column>>,
    time: TimeContext,
}

impl ColumnCollection {
    pub fn new(data_view: Arc<DataView>) -> Self {
        Self {
            data_view,
            settings: Arc::new(PipelineSettings::default()),
            columns: Vec::new(),
            time: TimeContext::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Load a persisted layer. Columns follow `column_order`; columns the
    /// order does not mention are appended in id order.
    pub fn from_persisted(data_view: Arc<DataView>, layer: &PersistedLayer) -> Result<Self, CollectionError> {
        let mut collection = Self::new(data_view);
        let mut ordered: Vec<&String> = Vec::with_capacity(layer.columns.len());
        for id in &layer.column_order {
            if !layer.columns.contains_key(id) {
                return Err(CollectionError::ColumnNotFound(id.clone()));
            }
            ordered.push(id);
        }
        ordered.extend(layer.columns.keys().filter(|id| !layer.column_order.contains(id)));

        for id in ordered {
            if collection.by_id(id).is_some() {
                return Err(CollectionError::DuplicateColumnId(id.clone()));
            }
            let column = column_from_persisted(id, &layer.columns[id])?;
            collection.columns.push(Arc::new(column));
        }
        debug!(columns = collection.len(), data_view = %collection.data_view.id, "Loaded persisted layer");
        Ok(collection)
    }

    pub fn to_persisted(&self) -> PersistedLayer {
        PersistedLayer {
            data_view_id: Some(self.data_view.id.clone()),
            column_order: self.columns.iter().map(|c| c.id.clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| (c.id.clone(), column_to_persisted(c, false)))
                .collect(),
        }
    }

    pub fn data_view(&self) -> &DataView {
        &self.data_view
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Time context last set through `set_time_range` / `set_time_fields`
    pub fn time_context(&self) -> &TimeContext {
        &self.time
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in collection order
    pub fn columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter().map(|c| c.as_ref())
    }

    // ---- mutation ----

    /// Add a column from its persisted shape; returns the column id
    pub fn add(&mut self, spec: ColumnSpec) -> Result<String, CollectionError> {
        let id = match &spec.id {
            Some(id) => id.clone(),
            None => self.next_id(),
        };
        if self.by_id(&id).is_some() {
            return Err(CollectionError::DuplicateColumnId(id));
        }
        let column = column_from_persisted(&id, &spec)?;
        trace!(id = %id, operation = %column.operation_type(), "Adding column");
        self.columns.push(Arc::new(column));
        Ok(id)
    }

    /// Build a new column with the operation's defaults; returns its id
    pub fn add_operation(&mut self, op: OperationType, field: Option<&str>) -> Result<String, CollectionError> {
        self.build_and_push(op, field, Vec::new())
    }

    /// Build a new column that reads other columns (adjacency metrics)
    pub fn add_reference_operation(
        &mut self,
        op: OperationType,
        references: Vec<String>,
    ) -> Result<String, CollectionError> {
        self.build_and_push(op, None, references)
    }

    fn build_and_push(
        &mut self,
        op: OperationType,
        field: Option<&str>,
        references: Vec<String>,
    ) -> Result<String, CollectionError> {
        let def = definition(op);
        let field = match field {
            Some(name) => {
                let field = self
                    .data_view
                    .get_field(name)
                    .ok_or_else(|| CollectionError::FieldNotFound(name.to_string()))?;
                if !def.applies_to(field) {
                    return Err(CollectionError::FieldNotApplicable {
                        operation: op.to_string(),
                        field: name.to_string(),
                    });
                }
                Some(field)
            }
            None if def.input == OperationInput::Field && !def.applies_to_documents => {
                return Err(CollectionError::FieldRequired {
                    operation: op.to_string(),
                });
            }
            None => None,
        };

        let id = self.next_id();
        let args = BuildColumnArgs {
            operation: op,
            id: id.clone(),
            field,
            collection: self,
            settings: &self.settings,
            references,
        };
        let column = (def.build_column)(&args)?;
        trace!(id = %id, operation = %op, "Built column");
        self.columns.push(Arc::new(column));
        Ok(id)
    }

    /// Next free positive integer id
    fn next_id(&self) -> String {
        let max = self
            .columns
            .iter()
            .filter_map(|c| c.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }

    pub fn remove(&mut self, id: &str) -> Result<Arc<Column>, CollectionError> {
        let index = self
            .columns
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| CollectionError::ColumnNotFound(id.to_string()))?;
        let removed = self.columns.remove(index);
        trace!(id = %id, "Removed column");
        self.notify_changed(id);
        Ok(removed)
    }

    /// Replace the column with the same id
    pub fn update(&mut self, column: Column) -> Result<(), CollectionError> {
        let slot = self
            .columns
            .iter_mut()
            .find(|c| c.id == column.id)
            .ok_or_else(|| CollectionError::ColumnNotFound(column.id.clone()))?;
        let id = column.id.clone();
        *slot = Arc::new(column);
        trace!(id = %id, "Updated column");
        self.notify_changed(&id);
        Ok(())
    }

    /// Give every other column a chance to react to a change
    fn notify_changed(&mut self, changed_id: &str) {
        let updates: Vec<(usize, Column)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.id != changed_id)
            .filter_map(|(i, c)| {
                let hook = definition(c.operation_type()).on_other_column_changed?;
                hook(c.as_ref(), self).map(|updated| (i, updated))
            })
            .collect();
        for (index, updated) in updates {
            trace!(id = %updated.id, changed = %changed_id, "Column adjusted after change");
            self.columns[index] = Arc::new(updated);
        }
    }

    /// Point the collection at another data view. Columns that cannot move
    /// are dropped, along with adjacency metrics that read them. Returns the
    /// dropped ids.
    pub fn change_data_view(&mut self, data_view: Arc<DataView>) -> Vec<String> {
        let mut dropped: Vec<String> = Vec::new();
        let from = Arc::clone(&self.data_view);
        self.columns.retain(|c| {
            let keep = (definition(c.operation_type()).is_transferable)(c.as_ref(), &from, &data_view);
            if !keep {
                dropped.push(c.id.clone());
            }
            keep
        });

        loop {
            let ids: HashSet<String> = self.columns.iter().map(|c| c.id.clone()).collect();
            let before = self.columns.len();
            self.columns.retain(|c| {
                let orphaned = c.operation_type().is_adjacency()
                    && c.references.iter().any(|r| !ids.contains(r));
                if orphaned {
                    dropped.push(c.id.clone());
                }
                !orphaned
            });
            if self.columns.len() == before {
                break;
            }
        }

        self.data_view = data_view;
        for id in dropped.clone() {
            self.notify_changed(&id);
        }
        debug!(dropped = ?dropped, data_view = %self.data_view.id, "Changed data view");
        dropped
    }

    // ---- time context ----

    /// Store the time range and push it down into date histograms,
    /// including ones nested in other columns' params
    pub fn set_time_range(&mut self, range: Option<TimeRange>) {
        self.time.time_range = range;
        for column in &mut self.columns {
            let needs_update = column_has_date_histogram(column);
            if needs_update {
                Arc::make_mut(column).walk_mut(&mut |c| {
                    if let OperationParams::DateHistogram(params) = &mut c.params {
                        params.bounds = range;
                    }
                });
            }
        }
    }

    pub fn set_time_fields(&mut self, fields: Vec<String>) {
        self.time.time_fields = fields;
    }

    /// A copy carrying `time` as its time context
    pub fn with_time_context(&self, time: &TimeContext) -> Self {
        let mut copy = self.clone();
        copy.set_time_range(time.time_range);
        copy.set_time_fields(time.time_fields.clone());
        copy
    }

    /// Distinct non-zero shifts of enabled metrics, ascending.
    /// `previous` resolves against `range` and is skipped without one.
    pub fn time_shifts(&self, range: Option<&TimeRange>) -> Vec<ResolvedShift> {
        let mut shifts: Vec<ResolvedShift> = self
            .columns()
            .filter(|c| c.enabled && c.has_time_shift())
            .filter_map(|c| c.time_shift.as_ref()?.resolve(range))
            .filter(|s| !s.is_zero())
            .collect();
        shifts.sort_by_key(|s| s.millis);
        shifts.dedup_by_key(|s| s.millis);
        shifts
    }

    pub fn has_time_shifts(&self) -> bool {
        self.columns().any(|c| c.enabled && c.has_time_shift())
    }

    // ---- lookups ----

    pub fn by_id(&self, id: &str) -> Option<&Column> {
        self.columns().find(|c| c.id == id)
    }

    /// Columns with the given operation name (`terms`, `sum`, ...)
    pub fn by_name(&self, name: &str) -> Vec<&Column> {
        self.columns().filter(|c| c.operation_type().as_str() == name).collect()
    }

    pub fn by_type(&self, group: AggGroup) -> Vec<&Column> {
        self.columns().filter(|c| c.group() == group).collect()
    }

    pub fn by_schema(&self, schema: &str) -> Vec<&Column> {
        self.columns().filter(|c| c.schema == schema).collect()
    }

    /// Enabled columns in compile order: buckets first, then metrics, each
    /// in collection order
    pub fn request_columns(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns().filter(|c| c.enabled).collect();
        columns.sort_by_key(|c| match c.group() {
            AggGroup::Buckets => 0,
            AggGroup::Metrics => 1,
        });
        columns
    }

    /// Display label: the explicit one, else the operation's default
    pub fn label(&self, id: &str) -> Option<String> {
        let column = self.by_id(id)?;
        Some(match &column.label {
            Some(label) => label.clone(),
            None => (definition(column.operation_type()).default_label)(column),
        })
    }

    /// An independent collection sharing column instances, optionally
    /// without disabled columns
    pub fn clone_with(&self, enabled_only: bool) -> Self {
        let mut copy = self.clone();
        if enabled_only {
            copy.columns.retain(|c| c.enabled);
        }
        copy
    }
}

fn column_has_date_histogram(column: &Column) -> bool {
    matches!(column.params, OperationParams::DateHistogram(_))
        || column.sub_columns().into_iter().any(column_has_date_histogram)
}
