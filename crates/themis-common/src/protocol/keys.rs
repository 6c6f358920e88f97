//! Entity identity: canonical resource names and per-shard storage keys.
//!
//! Both strings are derived from the same `(model, namespace, collection, id)`
//! tuple. The URN is hashed to choose a shard; the storage key addresses the
//! entity inside that shard's HTTP API.

/// Scheme tag of canonical resource names. A query mentioning it is routed to
/// a single shard.
pub const URN_PREFIX: &str = "urn:themis:";

/// `urn:themis:{model}:{namespace}:{collection}:{id}`
pub fn build_urn(model: &str, namespace: &str, collection: &str, id: &str) -> String {
    format!("{}{}:{}:{}:{}", URN_PREFIX, model, namespace, collection, id)
}

/// `{model}.{namespace}.{collection}:{id}`
pub fn build_storage_key(model: &str, namespace: &str, collection: &str, id: &str) -> String {
    format!("{}.{}.{}:{}", model, namespace, collection, id)
}

/// Case-insensitive check for the URN scheme tag.
pub fn contains_urn(text: &str) -> bool {
    text.to_lowercase().contains(URN_PREFIX)
}

/// Fully qualified reference to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub model: String,
    pub namespace: String,
    pub collection: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(
        model: impl Into<String>,
        namespace: impl Into<String>,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            namespace: namespace.into(),
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn urn(&self) -> String {
        build_urn(&self.model, &self.namespace, &self.collection, &self.id)
    }

    pub fn storage_key(&self) -> String {
        build_storage_key(&self.model, &self.namespace, &self.collection, &self.id)
    }

    /// Dot-delimited table name, the storage key without the id.
    pub fn table(&self) -> String {
        format!("{}.{}.{}", self.model, self.namespace, self.collection)
    }
}
