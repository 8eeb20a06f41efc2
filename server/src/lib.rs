//! CanonGraph MCP Server Library
//!
//! Serves a [`canongraph_store::KnowledgeGraph`] to AI clients over the
//! Model Context Protocol: every graph operation as a tool, project
//! context snapshots and statistics as resources.

pub mod error;
pub mod mcp;

pub use error::{ServerError, ServerResult};
pub use mcp::McpServer;
