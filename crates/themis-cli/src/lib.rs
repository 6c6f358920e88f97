//! # ThemisDB CLI
//!
//! Command-line access to a sharded ThemisDB cluster.
//!
//! The `themis` binary is a thin layer over [`themis_client::ThemisClient`]:
//! every subcommand maps onto one client operation and prints its result as
//! raw JSON on stdout, so output can be piped into `jq` and friends.
//!
//! ## Key Commands
//!
//! - `themis health`: Check a node's health endpoint
//! - `themis topology`: Fetch and print the current shard list
//! - `themis get|put|delete`: Single-entity operations
//! - `themis batch-get|batch-delete`: Multi-entity operations
//! - `themis query`: Run an AQL query (broadcast or URN-routed)
//! - `themis search`: Vector similarity search across all shards
//! - `themis traverse`: Graph traversal from a start node

pub mod settings;
