//! CanonGraph knowledge store
//!
//! A semantic knowledge graph for creative projects: typed nodes (assets,
//! code, mechanics, design, lore, patterns, constraints, decisions) linked
//! by weighted relationships, each node embedded for similarity search.
//!
//! ## Features
//!
//! - **Atomic two-store writes** - graph store and vector index never diverge
//! - **Hybrid search** - vector similarity plus one-hop graph expansion
//! - **Canon validation** - constraint rules, style drift, conflicts, duplicates
//! - **Pattern extraction** - deterministic greedy clustering per node type
//! - **RocksDB persistence** - LZ4-compressed stores with an HNSW index
//!
//! ## Example
//!
//! ```ignore
//! use canongraph_store::{HashingEmbedder, KnowledgeConfig, KnowledgeGraph, Node, SemanticQuery};
//!
//! let embedder = Arc::new(HashingEmbedder::default());
//! let graph = KnowledgeGraph::open(&data_dir, embedder, KnowledgeConfig::default())?;
//!
//! let card = Node::builder()
//!     .name("Card corners")
//!     .description("rounded corners on all cards")
//!     .design("ui")
//!     .project("deckbuilder")
//!     .build()?;
//! let card = graph.create_node(card).await?;
//!
//! let hits = graph.search(&SemanticQuery::text("card styling").limit(5)).await?;
//! ```

pub mod config;
pub mod context;
pub mod edge;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod knowledge;
pub mod migration;
pub mod node;
pub mod patterns;
pub mod repository;
pub mod search;
pub mod storage;
pub mod temporal;
pub mod validation;
pub mod vector;

// Re-exports for convenience
pub use config::{
    EmbeddingConfig, KnowledgeConfig, PatternConfig, SearchConfig, ValidationConfig, VectorConfig,
};
pub use context::{ContextAssembler, ContextSnapshot};
pub use edge::{Direction, EdgeId, Relationship, RelationshipType};
pub use embedding::{CachedProvider, EmbeddingProvider, HashingEmbedder, Modality};
#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedProvider;
pub use error::{KnowledgeError, Result};
pub use graph::{GraphStore, MemoryGraphStore, RocksGraphStore};
pub use knowledge::{
    BatchFailure, BatchReport, GraphOperation, GraphStats, KnowledgeGraph, OperationOutcome,
};
pub use node::{
    NewNode, NewNodeBuilder, Node, NodeId, NodePatch, NodeProperties, NodeType,
};
pub use patterns::{Pattern, PatternExtractor};
pub use repository::{CommitCheck, ConsistencyReport, NodeRepository, StoreView};
pub use search::{MatchReason, SearchEngine, SearchResult, SemanticQuery};
pub use temporal::VersionStamp;
pub use validation::{
    CanonValidator, ConstraintRule, ValidationReport, ValidationState, Violation, ViolationAction,
    ViolationKind,
};
pub use vector::{cosine_similarity, HnswVectorIndex, MemoryVectorIndex, VectorHit, VectorIndex};
