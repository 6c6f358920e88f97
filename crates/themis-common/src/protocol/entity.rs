//! Entity payloads.
//!
//! Entities are stored as an opaque `blob` string. Structured values are
//! JSON-encoded on write and decoded on read; plain strings travel unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::Result;

/// Path prefix of the single-entity API: `{shard}/entities/{storage_key}`.
pub const ENTITIES_PATH: &str = "/entities";

/// PUT body: `{"blob": "<string>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEnvelope {
    pub blob: String,
}

impl EntityEnvelope {
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self {
            blob: encode_blob(value)?,
        })
    }
}

/// JSON-encodes `value` unless it already serializes to a string.
pub fn encode_blob<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    if let Value::String(raw) = serde_json::to_value(value)? {
        return Ok(raw);
    }
    Ok(serde_json::to_string(value)?)
}

/// Parses string blobs as JSON when possible; anything else is returned as is.
pub fn decode_blob(blob: Value) -> Value {
    match blob {
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(raw),
        },
        other => other,
    }
}

/// Shape of a successful `GET /entities/{key}` response.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityResponse {
    /// Pre-decoded payload (`entity` field), returned verbatim.
    Entity(Value),
    /// Stored blob, already passed through [`decode_blob`].
    Blob(Value),
    /// Neither field present.
    Empty,
}

impl EntityResponse {
    pub fn from_payload(mut payload: Value) -> Self {
        if let Some(entity) = payload.get_mut("entity") {
            return EntityResponse::Entity(entity.take());
        }
        match payload.get_mut("blob") {
            Some(blob) => EntityResponse::Blob(decode_blob(blob.take())),
            None => EntityResponse::Empty,
        }
    }

    /// An empty response decodes to JSON `null`.
    pub fn into_value(self) -> Value {
        match self {
            EntityResponse::Entity(value) | EntityResponse::Blob(value) => value,
            EntityResponse::Empty => Value::Null,
        }
    }
}
