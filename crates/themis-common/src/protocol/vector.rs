//! Vector similarity search.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

pub const VECTOR_SEARCH_PATH: &str = "/vector/search";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchOptions {
    pub filter: Option<Value>,
    pub use_cursor: bool,
    pub cursor: Option<String>,
}

/// Body of `POST /vector/search`.
#[derive(Debug, Serialize)]
pub struct VectorSearchRequest<'a> {
    pub vector: &'a [f32],
    pub k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<&'a Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub use_cursor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<&'a str>,
}

impl<'a> VectorSearchRequest<'a> {
    pub fn new(vector: &'a [f32], k: usize, options: &'a VectorSearchOptions) -> Self {
        Self {
            vector,
            k,
            filter: options.filter.as_ref(),
            use_cursor: options.use_cursor,
            cursor: options.cursor.as_deref(),
        }
    }
}

/// Hits gathered from every shard that answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VectorSearchResult {
    pub results: Vec<Value>,
    /// Raw per-shard responses, in shard order.
    pub partials: Vec<Value>,
}

impl VectorSearchResult {
    /// Merges shard responses into the global top-`k`.
    ///
    /// A lone response keeps the shard's own ordering. Otherwise hits from
    /// `results` (or `items`) are ranked by `score`, falling back to
    /// `distance`, highest first. Either way at most `k` hits are returned.
    pub fn merge(responses: Vec<Value>, k: usize) -> Self {
        if responses.len() == 1 {
            let mut hits = hits_of(&responses[0]);
            hits.truncate(k);
            return Self {
                results: hits,
                partials: responses,
            };
        }

        let mut hits: Vec<Value> = responses.iter().flat_map(hits_of).collect();
        hits.sort_by(|a, b| rank(b).partial_cmp(&rank(a)).unwrap_or(Ordering::Equal));
        hits.truncate(k);

        Self {
            results: hits,
            partials: responses,
        }
    }
}

fn hits_of(payload: &Value) -> Vec<Value> {
    payload
        .get("results")
        .or_else(|| payload.get("items"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn rank(hit: &Value) -> f64 {
    hit.get("score")
        .and_then(Value::as_f64)
        .filter(|score| *score != 0.0)
        .or_else(|| hit.get("distance").and_then(Value::as_f64))
        .unwrap_or(0.0)
}
