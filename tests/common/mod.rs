//! Shared test utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use aggtree::{parser, ColumnCollection, DataView, PersistedLayer, TimeContext, TimeRange};

/// Load a data view fixture from the tests/test_data directory
pub fn load_view(name: &str) -> Arc<DataView> {
    let path = format!("tests/test_data/{}", name);
    let view = parser::parse_data_view_file(&path)
        .unwrap_or_else(|e| panic!("Failed to load test data {}: {}", name, e));
    Arc::new(view)
}

/// Load a persisted layer fixture from the tests/test_data directory
pub fn load_layer(name: &str) -> PersistedLayer {
    let path = format!("tests/test_data/{}", name);
    parser::parse_layer_file(&path)
        .unwrap_or_else(|e| panic!("Failed to load test data {}: {}", name, e))
}

/// Build a collection from a layer fixture over the logs data view
pub fn load_collection(layer: &str) -> ColumnCollection {
    ColumnCollection::from_persisted(load_view("logs_view.yaml"), &load_layer(layer))
        .unwrap_or_else(|e| panic!("Failed to build collection from {}: {}", layer, e))
}

/// A time context over `timestamp`
pub fn time_context(from: &str, to: &str) -> TimeContext {
    let range = TimeRange::parse(from, to).unwrap_or_else(|e| panic!("Bad time range: {}", e));
    TimeContext::new(range, vec!["timestamp".to_string()])
}

/// The week of 2024-03-04
pub fn one_week() -> TimeContext {
    time_context("2024-03-04T00:00:00Z", "2024-03-11T00:00:00Z")
}

/// Install a test subscriber so `RUST_LOG=aggtree=debug` shows pipeline logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
