use thiserror::Error;

use super::transaction::TransactionState;

#[derive(Error, Debug)]
pub enum ThemisError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Topology error: {message}")]
    Topology {
        message: String,
        #[source]
        source: Option<Box<ThemisError>>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Transaction {id} already {state}")]
    TransactionState { id: String, state: TransactionState },

    #[error("Execution error: {0}")]
    Execution(String),
}

impl ThemisError {
    pub fn topology(message: impl Into<String>) -> Self {
        ThemisError::Topology {
            message: message.into(),
            source: None,
        }
    }

    pub fn topology_caused_by(message: impl Into<String>, source: ThemisError) -> Self {
        ThemisError::Topology {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Connection failures and timeouts; the request never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ThemisError::Transport(_) | ThemisError::Timeout(_))
    }

    /// Errors worth retrying: transport failures and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            ThemisError::HttpStatus { status, .. } => *status >= 500,
            other => other.is_transport(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ThemisError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ThemisError>;
