//! Error types for the CanonGraph MCP server.

use canongraph_store::KnowledgeError;
use thiserror::Error;

use crate::mcp::protocol::JsonRpcError;

/// Errors that can occur while serving MCP requests.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Startup failed: {0}")]
    Startup(String),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    /// Whether the caller sent something wrong, as opposed to a server fault
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidParams(_)
            | ServerError::UnknownTool(_)
            | ServerError::ResourceNotFound(_) => true,
            ServerError::Knowledge(err) => matches!(
                err,
                KnowledgeError::NotFound(_)
                    | KnowledgeError::DanglingReference { .. }
                    | KnowledgeError::InvalidNode(_)
                    | KnowledgeError::InvalidInput(_)
                    | KnowledgeError::DimensionMismatch { .. }
                    | KnowledgeError::ValidationBlocked(_)
                    | KnowledgeError::Uuid(_)
            ),
            _ => false,
        }
    }
}

impl From<ServerError> for JsonRpcError {
    fn from(err: ServerError) -> Self {
        if err.is_client_error() {
            JsonRpcError::invalid_params(err.to_string())
        } else {
            JsonRpcError::internal_error(err.to_string())
        }
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
