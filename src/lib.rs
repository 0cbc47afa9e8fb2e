//! aggtree - Compile column layers into nested aggregation requests
//!
//! This library provides:
//! - Column definitions (buckets and metrics) over a data view
//! - A column collection with stable ordering, lookups and change cascades
//! - A static operation registry (applicability, defaults, DSL, ordering)
//! - Compilation of a collection into a nested aggregation request tree
//! - Time shifts: validation, the synthetic split and the response merge
//! - Persisted layer round-tripping through YAML or JSON
//!
//! # Architecture
//!
//! **Noun modules** (data structures):
//! - `data_view/` - fields and their types and restrictions
//! - `column/` - Column, OperationParams, persisted shapes
//! - `time/` - TimeRange, TimeContext, TimeShift, DateInterval
//! - `dsl/` - AggFragment and the request tree type
//! - `config` - PipelineSettings
//!
//! **Verb modules** (transformations):
//! - `parser/` - YAML/JSON → PersistedLayer, DataView, PipelineSettings
//! - `collection/` - PersistedLayer + DataView → ColumnCollection (and back)
//! - `operations/` - per-operation behavior table
//! - `compiler/` - ColumnCollection + TimeContext → RequestTree
//! - `postprocess/` - raw response → merged response
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use aggtree::{parser, compile, post_flight_transform, ColumnCollection, CompileOptions};
//!
//! let view = Arc::new(parser::parse_data_view_file("logs.yaml")?);
//! let layer = parser::parse_layer_file("layer.yaml")?;
//! let collection = ColumnCollection::from_persisted(view, &layer)?;
//! let request = compile(&collection, &time, &CompileOptions::default())?;
//! // ... run the request ...
//! let merged = post_flight_transform(&response, &collection, &time);
//! ```

pub mod data_view;
pub mod column;
pub mod time;
pub mod dsl;
pub mod config;
pub mod parser;
pub mod collection;
pub mod operations;
pub mod compiler;
pub mod postprocess;
pub mod error;

// Re-export commonly used types
pub use data_view::{DataView, Field, FieldType, AggregationRestriction};
pub use column::{Column, ColumnSpec, OperationParams, OperationType, AggGroup, PersistedColumn, PersistedLayer};
pub use time::{TimeContext, TimeRange, TimeShift, ResolvedShift, DateInterval};
pub use dsl::{AggFragment, RequestTree, TIME_SHIFT_SPLIT_ID};
pub use config::PipelineSettings;
pub use collection::{ColumnCollection, CollectionError};
pub use operations::{definition, OperationDefinition};
pub use compiler::{compile, search_time_filter, validate_time_shifts, CompileOptions, CompileError, TimeShiftErrorReason};
pub use postprocess::post_flight_transform;
pub use error::ParseError;
