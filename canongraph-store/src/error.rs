//! Error types for canongraph-store

use thiserror::Error;

use crate::validation::ValidationReport;

/// Errors that can occur in the knowledge store
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Missing node or edge reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Edge endpoint does not exist
    #[error("Dangling reference: edge {edge} points at missing node {missing}")]
    DanglingReference { edge: String, missing: String },

    /// Embedding provider failure (network, model, timeout)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Embedding provider unreachable while answering a query
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// A blocking canon violation prevented the write
    #[error("Validation blocked: {}", summarize(.0))]
    ValidationBlocked(Box<ValidationReport>),

    /// Graph store and vector index diverged
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Node content failed per-type validation
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vector length differs from the index dimension
    #[error("Dimension mismatch: index holds {expected}d vectors, got {actual}d")]
    DimensionMismatch { expected: usize, actual: usize },

    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UUID parsing error
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn summarize(report: &ValidationReport) -> String {
    let blocking: Vec<&str> = report
        .blocking()
        .map(|v| v.message.as_str())
        .collect();
    format!("{} blocking violation(s): {}", blocking.len(), blocking.join("; "))
}

impl KnowledgeError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create a search-unavailable error
    pub fn search_unavailable(msg: impl Into<String>) -> Self {
        Self::SearchUnavailable(msg.into())
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create an invalid node error
    pub fn invalid_node(msg: impl Into<String>) -> Self {
        Self::InvalidNode(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for failures originating in the embedding provider
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::SearchUnavailable(_))
    }

    /// The validation report carried by a blocked write
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::ValidationBlocked(report) => Some(report),
            _ => None,
        }
    }
}

/// Result type for knowledge store operations
pub type Result<T> = std::result::Result<T, KnowledgeError>;
