//! Server-assisted transaction envelopes.
//!
//! A transaction is opened on the first bootstrap endpoint, which hands back
//! an opaque id. Every request issued inside the transaction carries that id in
//! the [`TRANSACTION_HEADER`] so shards can apply it within the transaction's
//! isolation scope.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ThemisError;

pub const TRANSACTION_HEADER: &str = "X-Transaction-Id";
pub const TRANSACTION_BEGIN_PATH: &str = "/transaction/begin";
pub const TRANSACTION_COMMIT_PATH: &str = "/transaction/commit";
pub const TRANSACTION_ROLLBACK_PATH: &str = "/transaction/rollback";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    Snapshot,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = ThemisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            _ => Err(ThemisError::Config(format!(
                "Invalid isolation level: {} (expected snapshot or read_committed)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation_level: IsolationLevel,
    /// Server-side transaction timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl TransactionOptions {
    pub fn new(isolation_level: IsolationLevel) -> Self {
        Self {
            isolation_level,
            timeout_secs: None,
        }
    }

    /// Builds options from a user-supplied isolation level name.
    pub fn parse(isolation_level: &str) -> Result<Self, ThemisError> {
        Ok(Self::new(isolation_level.parse()?))
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

/// Body of `POST /transaction/begin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginTransactionRequest {
    pub isolation: IsolationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl From<&TransactionOptions> for BeginTransactionRequest {
    fn from(options: &TransactionOptions) -> Self {
        Self {
            isolation: options.isolation_level,
            timeout: options.timeout_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BeginTransactionResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Body of `POST /transaction/commit` and `POST /transaction/rollback`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionFinishRequest<'a> {
    pub transaction_id: &'a str,
}

/// Lifecycle of a transaction. `Committed` and `RolledBack` are terminal.
///
/// `Finishing` is held while a commit or rollback request is in flight; it
/// returns to `Active` if that request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Active,
    Finishing,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::RolledBack)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionState::Active => "active",
            TransactionState::Finishing => "finishing",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        })
    }
}
