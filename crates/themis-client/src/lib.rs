//! ThemisDB Client
//!
//! An async, topology-aware client for sharded ThemisDB clusters.
//!
//! The client hashes each entity's resource name to pick the shard that owns
//! it, so reads and writes go straight to the right node without a proxy.
//! The shard map is loaded from the cluster's metadata service on first use;
//! while it is unavailable, requests are routed over the bootstrap endpoints.
//!
//! # Features
//!
//! - Single-entity `get`/`put`/`delete` with JSON blob encoding
//! - Batch operations on a bounded, per-call worker pool
//! - AQL queries (single-shard or broadcast), vector search and graph traversal
//! - Server-assisted transactions with a commit-or-rollback scope helper
//! - Retries with exponential backoff and per-request timeouts
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use themis_client::{BatchOptions, ClientConfig, ThemisClient, TransactionOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ThemisClient::new(ClientConfig::new(["http://127.0.0.1:8765"]))?;
//!
//! client.put("relational", "users", "1", &json!({"name": "Alice"})).await?;
//! let users = client
//!     .batch_get("relational", "users", ["1", "2"], BatchOptions::default())
//!     .await?;
//! println!("found {} user(s)", users.found.len());
//!
//! client
//!     .with_transaction(TransactionOptions::default(), |tx| async move {
//!         tx.put("relational", "accounts", "a", &json!({"balance": 90})).await?;
//!         tx.put("relational", "accounts", "b", &json!({"balance": 110})).await?;
//!         Ok::<_, themis_client::ThemisError>(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod executor;
pub mod query;
pub mod topology;
pub mod transaction;
pub mod transport;

pub use batch::{worker_count, BatchOptions};
pub use client::ThemisClient;
pub use config::ClientConfig;
pub use executor::{RequestExecutor, RetryConfig};
pub use topology::TopologyResolver;
pub use transaction::Transaction;
pub use transport::{HttpRequest, HttpResponse, HyperTransport, Transport, USER_AGENT};

pub use themis_common::{
    BatchGetResult, BatchWriteResult, Endpoint, EntityRef, IsolationLevel, QueryOptions,
    QueryResult, Result, ThemisError, Topology, TransactionOptions, TransactionState,
    VectorSearchOptions, VectorSearchResult,
};
