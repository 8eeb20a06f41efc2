//! MCP (Model Context Protocol) Server Module
//!
//! This module implements an MCP server for the knowledge graph, allowing AI
//! clients like Claude Desktop, Cursor, and Cline to record and query
//! project canon.
//!
//! ## Usage
//!
//! ```bash
//! canongraph --data-dir /path/to/project/.canongraph
//! ```
//!
//! The MCP server communicates via stdio using JSON-RPC 2.0.

pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::*;
pub use server::McpServer;
