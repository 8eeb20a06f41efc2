//! The knowledge graph handle
//!
//! [`KnowledgeGraph`] wires the stores, the embedding provider and the
//! engines together. It is an ordinary value: create one per project or
//! per test, and pass it (or an `Arc` of it) to whoever needs it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::KnowledgeConfig;
use crate::context::{ContextAssembler, ContextSnapshot};
use crate::edge::{Direction, EdgeId, Relationship, RelationshipType};
use crate::embedding::{CachedProvider, EmbeddingProvider};
use crate::error::{KnowledgeError, Result};
use crate::graph::{GraphStore, MemoryGraphStore, RocksGraphStore};
use crate::node::{NewNode, Node, NodeId, NodePatch, NodeProperties, NodeType, PatternProperties};
use crate::patterns::{Pattern, PatternExtractor};
use crate::repository::{ConsistencyReport, NodeRepository};
use crate::search::{SearchEngine, SearchResult, SemanticQuery};
use crate::validation::{CanonValidator, ValidationReport};
use crate::vector::{HnswVectorIndex, VectorIndex};

/// One step of a batch update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphOperation {
    Create {
        node: NewNode,
    },
    Update {
        id: NodeId,
        patch: NodePatch,
    },
    Delete {
        id: NodeId,
    },
    Relate {
        source: NodeId,
        target: NodeId,
        kind: RelationshipType,
        #[serde(default)]
        strength: Option<f32>,
    },
    Unrelate {
        edge: EdgeId,
    },
}

/// What a committed operation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationOutcome {
    Created { id: NodeId },
    Updated { id: NodeId, version: u64 },
    Deleted { id: NodeId, edges_removed: usize },
    Related { edge: EdgeId },
    Unrelated { edge: EdgeId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

/// Result of [`KnowledgeGraph::update_graph`]
///
/// Operations before `failed.index` stay committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub applied: Vec<OperationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<BatchFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges: usize,
    pub edges_by_type: BTreeMap<String, usize>,
    pub vectors: usize,
    pub dimension: Option<usize>,
    pub embedder: String,
}

pub struct KnowledgeGraph {
    repository: NodeRepository,
    search: SearchEngine,
    validator: Arc<CanonValidator>,
    patterns: PatternExtractor,
    config: KnowledgeConfig,
}

impl KnowledgeGraph {
    /// Volatile graph, nothing touches disk
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>, config: KnowledgeConfig) -> Self {
        let vectors = Arc::new(HnswVectorIndex::in_memory(config.vector.clone()));
        Self::with_stores(Arc::new(MemoryGraphStore::new()), vectors, embedder, config)
    }

    /// Persistent graph under `dir` (`graph/` and `vectors/` RocksDB instances)
    pub fn open(
        dir: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: KnowledgeConfig,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let graph = Arc::new(RocksGraphStore::open(dir.join("graph"))?);
        let vectors = Arc::new(HnswVectorIndex::open(dir.join("vectors"), config.vector.clone())?);
        let knowledge = Self::with_stores(graph, vectors, embedder, config);

        // Finish whatever an interrupted commit left half-applied
        let report = knowledge.repository.audit()?;
        if !report.is_consistent() {
            log::warn!(
                "Recovered store: removed {} incomplete node(s) and {} orphan vector(s)",
                report.incomplete_nodes_removed.len(),
                report.orphan_vectors_removed.len()
            );
        }

        log::info!("Knowledge graph opened at: {}", dir.display());
        Ok(knowledge)
    }

    /// Graph over caller-supplied stores
    pub fn with_stores(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: KnowledgeConfig,
    ) -> Self {
        let embedder: Arc<dyn EmbeddingProvider> = if config.embedding.cache {
            Arc::new(CachedProvider::new(embedder, config.embedding.cache_capacity))
        } else {
            embedder
        };

        let validator = Arc::new(CanonValidator::new(config.validation.clone()));
        let mut repository = NodeRepository::new(graph, vectors, embedder, config.embedding.clone());
        if config.validation.validate_on_write {
            repository = repository.with_commit_check(validator.clone());
        }

        Self {
            repository,
            search: SearchEngine::new(config.search.clone()),
            validator,
            patterns: PatternExtractor::new(config.patterns.clone()),
            config,
        }
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub async fn create_node(&self, node: NewNode) -> Result<Node> {
        self.repository.create(node).await
    }

    pub async fn update_node(&self, id: &NodeId, patch: NodePatch) -> Result<Node> {
        self.repository.update(id, patch).await
    }

    /// Delete a node; returns the edges removed with it
    pub async fn delete_node(&self, id: &NodeId) -> Result<Vec<Relationship>> {
        self.repository.delete(id).await
    }

    pub fn get_node(&self, id: &NodeId) -> Result<Node> {
        self.repository.get(id)
    }

    /// Link two existing nodes; strength defaults to 1.0
    pub async fn create_relationship(
        &self,
        source: NodeId,
        target: NodeId,
        kind: RelationshipType,
        strength: Option<f32>,
    ) -> Result<Relationship> {
        let mut edge = Relationship::new(source, target, kind);
        if let Some(strength) = strength {
            edge = edge.with_strength(strength)?;
        }
        self.repository.relate(edge).await
    }

    /// Store a fully built edge (with metadata)
    pub async fn add_relationship(&self, edge: Relationship) -> Result<Relationship> {
        self.repository.relate(edge).await
    }

    pub async fn remove_relationship(&self, id: &EdgeId) -> Result<Relationship> {
        self.repository.unrelate(id).await
    }

    pub fn get_relationships(&self, id: &NodeId, direction: Direction) -> Result<Vec<Relationship>> {
        self.repository.relationships(id, direction)
    }

    /// Nodes reachable over outgoing edges (embeddings omitted)
    pub fn traverse(
        &self,
        start: &NodeId,
        max_depth: usize,
        kinds: Option<&[RelationshipType]>,
    ) -> Result<Vec<Node>> {
        self.repository
            .read(|view| view.graph().traverse(start, max_depth, kinds))
    }

    pub async fn search(&self, query: &SemanticQuery) -> Result<Vec<SearchResult>> {
        self.search.search(&self.repository, query).await
    }

    /// Validate `node` against an explicit constraint set
    ///
    /// A node without an embedding uses its stored vector, or is embedded
    /// on the fly if it was never committed.
    pub async fn validate_canon(&self, node: &Node, constraints: &[Node]) -> Result<ValidationReport> {
        let mut candidate = node.clone();
        if candidate.embedding.is_empty() {
            let stored = self.repository.read(|view| view.vectors().get(&node.id))?;
            candidate.embedding = match stored {
                Some(vector) => vector,
                None => self.repository.embed(&node.embedding_input()).await?,
            };
        }
        self.repository
            .read(|view| self.validator.validate(view, &candidate, constraints))
    }

    /// Validate a stored node against its linked and global constraints
    pub fn validate_node(&self, id: &NodeId) -> Result<ValidationReport> {
        self.repository.read(|view| {
            let node = view.node(id)?;
            let constraints = self.validator.constraints_for(view, &node)?;
            self.validator.validate(view, &node, &constraints)
        })
    }

    /// Validate content before it is committed, against the global constraints
    pub async fn validate_draft(&self, draft: NewNode) -> Result<ValidationReport> {
        draft.validate()?;
        let embedding = self.repository.embed(&draft.embedding_input()).await?;
        let candidate = draft.into_node(embedding);
        self.repository.read(|view| {
            let constraints = self.validator.constraints_for(view, &candidate)?;
            self.validator.validate(view, &candidate, &constraints)
        })
    }

    /// Cluster nodes with the configured similarity threshold
    pub fn extract_patterns(
        &self,
        node_type: Option<NodeType>,
        min_frequency: Option<usize>,
    ) -> Result<Vec<Pattern>> {
        let nodes = self.repository.read(|view| view.nodes())?;
        Ok(self.patterns.extract(&nodes, node_type, min_frequency))
    }

    pub fn extract_patterns_with(
        &self,
        node_type: Option<NodeType>,
        min_similarity: f32,
        min_frequency: usize,
    ) -> Result<Vec<Pattern>> {
        let nodes = self.repository.read(|view| view.nodes())?;
        Ok(self
            .patterns
            .extract_with(&nodes, node_type, min_similarity, min_frequency))
    }

    /// Store a pattern as a `pattern` node with `part_of` edges from its members
    ///
    /// All or nothing: if any edge cannot be stored the node is deleted
    /// again, taking the edges already written with it.
    pub async fn persist_pattern(&self, pattern: &Pattern) -> Result<Node> {
        for member in &pattern.members {
            if !self.repository.read(|view| view.graph().contains_node(member))? {
                return Err(KnowledgeError::not_found(member.to_string()));
            }
        }

        let node = NewNode {
            name: pattern.name.clone(),
            description: format!(
                "{} {} nodes with mean similarity {:.3}",
                pattern.frequency, pattern.node_type, pattern.similarity
            ),
            tags: pattern.shared_tags.clone(),
            project: None,
            properties: NodeProperties::Pattern(PatternProperties {
                frequency: pattern.frequency,
                members: pattern.members.clone(),
                similarity: pattern.similarity,
            }),
            extra: BTreeMap::new(),
        };
        let stored = self.repository.create(node).await?;

        for member in &pattern.members {
            let edge = Relationship::new(*member, stored.id, RelationshipType::PartOf);
            if let Err(err) = self.repository.relate(edge).await {
                log::warn!(
                    "Linking pattern {} failed, removing node {}: {}",
                    pattern.id,
                    stored.id,
                    err
                );
                self.repository.delete(&stored.id).await?;
                return Err(err);
            }
        }

        log::info!("Persisted pattern {} as node {}", pattern.id, stored.id);
        Ok(stored)
    }

    pub fn get_project_context(&self, project: &str) -> Result<ContextSnapshot> {
        let assembler = ContextAssembler::new(&self.patterns);
        self.repository.read(|view| assembler.assemble(view, project))
    }

    /// Apply operations in order, stopping at the first failure
    pub async fn update_graph(&self, operations: Vec<GraphOperation>) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, operation) in operations.into_iter().enumerate() {
            match self.apply(operation).await {
                Ok(outcome) => report.applied.push(outcome),
                Err(err) => {
                    log::warn!("Batch operation {} failed: {}", index, err);
                    report.failed = Some(BatchFailure {
                        index,
                        error: err.to_string(),
                    });
                    break;
                }
            }
        }

        report
    }

    async fn apply(&self, operation: GraphOperation) -> Result<OperationOutcome> {
        Ok(match operation {
            GraphOperation::Create { node } => OperationOutcome::Created {
                id: self.create_node(node).await?.id,
            },
            GraphOperation::Update { id, patch } => {
                let node = self.update_node(&id, patch).await?;
                OperationOutcome::Updated {
                    id,
                    version: node.version(),
                }
            }
            GraphOperation::Delete { id } => OperationOutcome::Deleted {
                id,
                edges_removed: self.delete_node(&id).await?.len(),
            },
            GraphOperation::Relate {
                source,
                target,
                kind,
                strength,
            } => OperationOutcome::Related {
                edge: self
                    .create_relationship(source, target, kind, strength)
                    .await?
                    .id,
            },
            GraphOperation::Unrelate { edge } => OperationOutcome::Unrelated {
                edge: self.remove_relationship(&edge).await?.id,
            },
        })
    }

    /// All nodes, oldest first, optionally of one type
    pub fn list_nodes(&self, node_type: Option<NodeType>) -> Result<Vec<Node>> {
        self.repository.read(|view| match node_type {
            Some(t) => view.nodes_of_type(t),
            None => view.nodes(),
        })
    }

    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<Node>> {
        Ok(self
            .list_nodes(None)?
            .into_iter()
            .filter(|n| n.has_tag(tag))
            .collect())
    }

    pub fn stats(&self) -> Result<GraphStats> {
        self.repository.read(|view| {
            let mut nodes_by_type = BTreeMap::new();
            for node in view.graph().nodes()? {
                *nodes_by_type
                    .entry(node.node_type().to_string())
                    .or_insert(0) += 1;
            }
            let mut edges_by_type = BTreeMap::new();
            for edge in view.graph().edges()? {
                *edges_by_type.entry(edge.kind.to_string()).or_insert(0) += 1;
            }

            Ok(GraphStats {
                nodes: view.graph().node_count(),
                nodes_by_type,
                edges: view.graph().edge_count(),
                edges_by_type,
                vectors: view.vectors().len(),
                dimension: view.vectors().dimension(),
                embedder: self.repository.embedder().name().to_string(),
            })
        })
    }

    pub async fn check_consistency(&self) -> Result<ConsistencyReport> {
        self.repository.check_consistency().await
    }

    pub fn flush(&self) -> Result<()> {
        self.repository.flush()
    }
}
