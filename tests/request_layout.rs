//! Integration tests for request compilation
//!
//! Tests that layers compile into the expected nesting of aggregations.

mod common;

use common::{init_tracing, load_collection, load_layer, load_view, one_week};
use aggtree::{compile, ColumnCollection, ColumnSpec, CompileError, CompileOptions, OperationType, TimeContext};
use serde_json::{json, Value};

#[test]
fn test_daily_count() {
    init_tracing();
    let collection = load_collection("daily_count.yaml");

    let tree = compile(&collection, &one_week(), &CompileOptions::default()).expect("Compile should succeed");

    assert_eq!(
        Value::Object(tree),
        json!({
            "col1": {
                "date_histogram": {
                    "field": "timestamp",
                    "fixed_interval": "1d",
                    "time_zone": "UTC",
                    "min_doc_count": 1
                },
                "aggs": {
                    "col2": {"value_count": {"field": "bytes"}}
                }
            }
        })
    );
}

#[test]
fn test_buckets_nest_and_metrics_are_siblings() {
    let collection = load_collection("hosts_by_size.yaml");

    let tree = compile(&collection, &TimeContext::default(), &CompileOptions::default())
        .expect("Compile should succeed");

    // One top-level aggregation: the first bucket
    assert_eq!(tree.len(), 1);
    let hosts = &tree["hosts"];
    assert_eq!(hosts["terms"]["size"], json!(5));
    assert_eq!(hosts["terms"]["order"], json!({"avg_bytes": "desc"}));

    // The ordering metric sits next to the nested histogram
    let host_aggs: Vec<&String> = hosts["aggs"].as_object().unwrap().keys().collect();
    assert_eq!(host_aggs, vec!["avg_bytes", "sizes"]);

    // Metrics sit side by side inside the innermost bucket, in layer order
    let sizes = &hosts["aggs"]["sizes"];
    assert_eq!(sizes["histogram"]["interval"], json!(1024.0));
    let leaf: Vec<&String> = sizes["aggs"].as_object().unwrap().keys().collect();
    assert_eq!(leaf, vec!["avg_bytes", "max_bytes"]);
    assert_eq!(sizes["aggs"]["max_bytes"], json!({"max": {"field": "bytes"}}));
}

#[test]
fn test_disabled_columns_are_not_compiled() {
    let collection = load_collection("hosts_by_size.yaml");

    let tree = compile(&collection, &TimeContext::default(), &CompileOptions::default()).unwrap();
    let text = serde_json::to_string(&tree).unwrap();
    assert!(!text.contains("spare"));

    // Dropping disabled columns up front compiles to the same tree
    let enabled = collection.clone_with(true);
    assert_eq!(enabled.len(), collection.len() - 1);
    let again = compile(&enabled, &TimeContext::default(), &CompileOptions::default()).unwrap();
    assert_eq!(again, tree);
}

#[test]
fn test_hierarchical_metrics() {
    let collection = load_collection("hosts_by_size.yaml");

    let options = CompileOptions { hierarchical: true };
    let tree = compile(&collection, &TimeContext::default(), &options).unwrap();

    let host_aggs: Vec<&String> = tree["hosts"]["aggs"].as_object().unwrap().keys().collect();
    assert_eq!(host_aggs, vec!["avg_bytes", "sizes", "max_bytes"]);
    assert!(tree["hosts"]["aggs"]["sizes"]["aggs"].get("max_bytes").is_some());
}

#[test]
fn test_compile_is_deterministic() {
    let collection = load_collection("hosts_by_size.yaml");
    let first = compile(&collection, &one_week(), &CompileOptions::default()).unwrap();
    let second = compile(&collection, &one_week(), &CompileOptions::default()).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_auto_interval_from_time_range() {
    let mut collection = load_collection("daily_count.yaml");
    collection
        .add(ColumnSpec::new("date_histogram").with_id("auto").with_field("timestamp"))
        .unwrap();

    let tree = compile(&collection, &one_week(), &CompileOptions::default()).unwrap();
    // A week over 50 bars lands on 3 hour buckets
    let auto = &tree["col1"]["aggs"]["auto"]["date_histogram"];
    assert_eq!(auto["fixed_interval"], json!("3h"));
    assert_eq!(auto["min_doc_count"], json!(0));
    assert!(auto.get("extended_bounds").is_some());
}

#[test]
fn test_field_missing_from_data_view() {
    let mut layer = load_layer("daily_count.yaml");
    if let Some(column) = layer.columns.get_mut("col2") {
        column.source_field = Some("response_time".into());
    }
    let collection = ColumnCollection::from_persisted(load_view("logs_view.yaml"), &layer).unwrap();

    assert_eq!(
        compile(&collection, &one_week(), &CompileOptions::default()),
        Err(CompileError::UnresolvedField {
            column_id: "col2".into(),
            field: "response_time".into(),
        })
    );
}

#[test]
fn test_restricted_field_rejects_operation() {
    let collection =
        ColumnCollection::from_persisted(load_view("rollup_view.yaml"), &load_layer("daily_count.yaml")).unwrap();

    assert_eq!(
        compile(&collection, &one_week(), &CompileOptions::default()),
        Err(CompileError::FieldNotApplicable {
            column_id: "col2".into(),
            operation: "count".into(),
            field: "bytes".into(),
        })
    );
}

#[test]
fn test_adjacency_needs_histogram() {
    let mut collection = load_collection("hosts_by_size.yaml");
    collection
        .add_reference_operation(OperationType::CumulativeSum, vec!["max_bytes".into()])
        .unwrap();
    assert!(compile(&collection, &TimeContext::default(), &CompileOptions::default()).is_ok());

    let mut no_histogram = load_collection("daily_count.yaml");
    no_histogram.remove("col1").unwrap();
    let id = no_histogram
        .add_reference_operation(OperationType::CumulativeSum, vec!["col2".into()])
        .unwrap();
    assert_eq!(
        compile(&no_histogram, &TimeContext::default(), &CompileOptions::default()),
        Err(CompileError::MissingHistogram { column_id: id })
    );
}
