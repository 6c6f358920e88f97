use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GRAPH_TRAVERSE_PATH: &str = "/graph/traverse";

/// Body of `POST /graph/traverse`. `edge_type` is sent as `null` when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraverseRequest {
    pub start: String,
    pub max_depth: u32,
    pub edge_type: Option<String>,
}

/// Visited node list from either the `nodes` or the `visited` field.
pub fn traversal_nodes(payload: &Value) -> Vec<Value> {
    payload
        .get("nodes")
        .or_else(|| payload.get("visited"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
