use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Outcome of a batch read. Each requested id lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchGetResult {
    pub found: HashMap<String, Value>,
    pub missing: Vec<String>,
    pub errors: HashMap<String, String>,
}

impl BatchGetResult {
    pub fn len(&self) -> usize {
        self.found.len() + self.missing.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a batch write or delete. Each requested id lands in exactly one
/// bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchWriteResult {
    pub succeeded: Vec<String>,
    pub failed: HashMap<String, String>,
}

impl BatchWriteResult {
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
