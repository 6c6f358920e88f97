//! ThemisDB Common Types
//!
//! This crate provides the protocol definitions and routing primitives shared
//! by the ThemisDB client and tooling.
//!
//! # Overview
//!
//! ThemisDB is a horizontally sharded, multi-model database reached over HTTP.
//! Every entity lives on exactly one shard. Clients locate that shard on their
//! own by hashing the entity's canonical resource name, so this crate fixes the
//! pieces every client must agree on:
//!
//! - **Endpoints**: normalized shard base URLs
//! - **Stable hashing**: BLAKE2b-32 routing, identical across processes and SDKs
//! - **Entity keys**: the `urn:themis:` resource name and the per-shard storage key
//! - **Wire types**: topology, entity, query, vector search, graph and transaction payloads
//! - **Errors**: the [`ThemisError`] taxonomy used across the workspace
//!
//! # Example
//!
//! ```
//! use themis_common::{shard_index, EntityRef};
//!
//! let entity = EntityRef::new("relational", "default", "users", "42");
//! assert_eq!(entity.urn(), "urn:themis:relational:default:users:42");
//! assert_eq!(entity.storage_key(), "relational.default.users:42");
//!
//! let shard = shard_index(&entity.urn(), 4).unwrap();
//! assert!(shard < 4);
//! ```

pub mod protocol;

pub use protocol::*;
