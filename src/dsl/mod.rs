//! Aggregation DSL fragments (noun module)
//!
//! The request tree itself is a plain JSON object; this module holds the
//! per-column fragment an operation emits before the compiler places it.

use serde_json::{Map, Value};

/// Reserved id of the synthetic filters aggregation that fans a request out
/// per time shift
pub const TIME_SHIFT_SPLIT_ID: &str = "time_offset_split";

/// Format used for range filters on time fields
pub const DEFAULT_TIME_FORMAT: &str = "strict_date_optional_time";

/// A compiled request tree (aggregation id -> clause)
pub type RequestTree = Map<String, Value>;

/// The DSL one column contributes to a scope
///
/// `body` is the column's own clause, stored under the column id.
/// `parent_aggs` are auxiliary sibling aggregations the clause depends on
/// (a filter wrapping the real metric, the inputs of a bucket script);
/// they land in the same scope as the body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggFragment {
    pub body: Option<Map<String, Value>>,
    pub parent_aggs: Vec<(String, AggFragment)>,
}

impl AggFragment {
    /// A fragment with no DSL of its own
    pub fn none() -> Self {
        Self::default()
    }

    /// A single clause such as `{"sum": {"field": "bytes"}}`
    pub fn clause(kind: &str, params: Value) -> Self {
        let mut body = Map::new();
        body.insert(kind.to_string(), params);
        Self {
            body: Some(body),
            parent_aggs: Vec::new(),
        }
    }

    pub fn from_body(body: Map<String, Value>) -> Self {
        Self {
            body: Some(body),
            parent_aggs: Vec::new(),
        }
    }

    pub fn with_parent(mut self, id: impl Into<String>, parent: AggFragment) -> Self {
        self.parent_aggs.push((id.into(), parent));
        self
    }

    /// True when writing this fragment would leave its scope untouched
    pub fn is_empty(&self) -> bool {
        self.body.as_ref().map_or(true, |b| b.is_empty())
            && self.parent_aggs.iter().all(|(_, p)| p.is_empty())
    }

    pub fn has_body(&self) -> bool {
        self.body.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Place the fragment into `scope` under `id`.
    ///
    /// Parent aggregations go first (depth first, so a parent's own parents
    /// precede it). Empty bodies are never written, which prunes auxiliary
    /// containers that ended up with nothing in them.
    pub fn write_into(&self, id: &str, scope: &mut Map<String, Value>) {
        for (parent_id, parent) in &self.parent_aggs {
            parent.write_into(parent_id, scope);
        }
        if let Some(body) = &self.body {
            if !body.is_empty() {
                scope.insert(id.to_string(), Value::Object(body.clone()));
            }
        }
    }

    /// The fragment rendered as a standalone scope
    pub fn to_scope(&self, id: &str) -> Map<String, Value> {
        let mut scope = Map::new();
        self.write_into(id, &mut scope);
        scope
    }
}
