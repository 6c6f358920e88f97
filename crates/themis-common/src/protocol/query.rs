//! AQL query requests and results.
//!
//! Shards answer `POST /query/aql` in one of two documented shapes:
//!
//! - **entities**: `{"entities": [...], "count": N, "table": "..."}`, not paginated
//! - **items**: `{"items": [...], "has_more": bool, "next_cursor": "...", "table": "..."}`
//!
//! [`QueryResponse::classify`] decides which shape a payload has before any
//! field is read; unrecognized payloads yield an empty result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::decode_blob;

pub const QUERY_PATH: &str = "/query/aql";

/// Optional query parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "params_are_empty")]
    pub params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_cursor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
}

fn params_are_empty(params: &Option<Map<String, Value>>) -> bool {
    params.as_ref().map_or(true, Map::is_empty)
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        self
    }

    pub fn with_cursor(mut self) -> Self {
        self.use_cursor = true;
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Body of `POST /query/aql`.
#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    #[serde(flatten)]
    pub options: &'a QueryOptions,
}

impl<'a> QueryRequest<'a> {
    pub fn new(query: &'a str, options: &'a QueryOptions) -> Self {
        Self { query, options }
    }
}

/// Discriminated view of one shard's query response.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Entities {
        entities: Vec<Value>,
        count: Option<u64>,
        table: Option<String>,
    },
    Paginated {
        items: Vec<Value>,
        has_more: bool,
        next_cursor: Option<String>,
        table: Option<String>,
    },
    Unrecognized,
}

impl QueryResponse {
    pub fn classify(payload: &Value) -> Self {
        let table = payload
            .get("table")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(entities) = payload.get("entities").and_then(Value::as_array) {
            return QueryResponse::Entities {
                entities: entities.clone(),
                count: payload.get("count").and_then(Value::as_u64),
                table,
            };
        }

        if let Some(items) = payload.get("items").and_then(Value::as_array) {
            return QueryResponse::Paginated {
                items: items.clone(),
                has_more: payload
                    .get("has_more")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                next_cursor: payload
                    .get("next_cursor")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                table,
            };
        }

        QueryResponse::Unrecognized
    }
}

/// Decoded query result, from one shard or merged from several.
///
/// `next_cursor` is only meaningful for single-shard results: a broadcast
/// query merges pages from independent shards and always drops the cursor,
/// so cross-shard pagination is unsupported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub items: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub raw: Value,
    pub count: Option<u64>,
    pub table: Option<String>,
}

impl QueryResult {
    pub fn empty(raw: Value) -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            next_cursor: None,
            raw,
            count: None,
            table: None,
        }
    }

    pub fn from_payload(payload: Value) -> Self {
        match QueryResponse::classify(&payload) {
            QueryResponse::Entities {
                entities,
                count,
                table,
            } => Self {
                items: entities.into_iter().map(decode_blob).collect(),
                has_more: false,
                next_cursor: None,
                raw: payload,
                count,
                table,
            },
            QueryResponse::Paginated {
                items,
                has_more,
                next_cursor,
                table,
            } => Self {
                items: items.into_iter().map(decode_blob).collect(),
                has_more,
                next_cursor,
                raw: payload,
                count: None,
                table,
            },
            QueryResponse::Unrecognized => Self::empty(payload),
        }
    }

    /// Merges per-shard results in the given order.
    ///
    /// A single partial is returned unchanged. Several partials have their
    /// items concatenated, `has_more` OR-ed and the cursor dropped.
    pub fn merge(partials: Vec<QueryResult>) -> Self {
        if partials.len() <= 1 {
            return partials
                .into_iter()
                .next()
                .unwrap_or_else(|| Self::empty(Value::Object(Map::new())));
        }

        let mut items = Vec::new();
        let mut has_more = false;
        let mut raws = Vec::with_capacity(partials.len());
        for part in partials {
            has_more |= part.has_more;
            items.extend(part.items);
            raws.push(part.raw);
        }

        let mut raw = Map::new();
        raw.insert("partials".to_string(), Value::Array(raws));

        Self {
            items,
            has_more,
            next_cursor: None,
            raw: Value::Object(raw),
            count: None,
            table: None,
        }
    }
}
