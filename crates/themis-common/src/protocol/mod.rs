pub mod batch;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod graph;
pub mod hashing;
pub mod keys;
pub mod query;
pub mod topology;
pub mod transaction;
pub mod vector;


pub use batch::{BatchGetResult, BatchWriteResult};
pub use endpoint::{normalize_endpoints, Endpoint};
pub use entity::{decode_blob, encode_blob, EntityEnvelope, EntityResponse, ENTITIES_PATH};
pub use error::{Result, ThemisError};
pub use graph::{traversal_nodes, TraverseRequest, GRAPH_TRAVERSE_PATH};
pub use hashing::{shard_index, stable_hash};
pub use keys::{build_storage_key, build_urn, contains_urn, EntityRef, URN_PREFIX};
pub use query::{QueryOptions, QueryRequest, QueryResponse, QueryResult, QUERY_PATH};
pub use topology::{extract_endpoints, Topology, DEFAULT_METADATA_PATH, HEALTH_PATH};
pub use transaction::{
    BeginTransactionRequest, BeginTransactionResponse, IsolationLevel, TransactionFinishRequest,
    TransactionOptions, TransactionState, TRANSACTION_BEGIN_PATH, TRANSACTION_COMMIT_PATH,
    TRANSACTION_HEADER, TRANSACTION_ROLLBACK_PATH,
};
pub use vector::{VectorSearchOptions, VectorSearchRequest, VectorSearchResult, VECTOR_SEARCH_PATH};
