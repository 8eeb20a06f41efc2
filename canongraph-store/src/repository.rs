//! Node lifecycle over the graph store and vector index
//!
//! The repository is the only writer of either store. Writers are
//! serialized by an async mutex; the two-store commit itself runs under a
//! short write lock on the commit gate, and readers take the gate's read
//! side, so no reader ever sees a node in one store but not the other.
//!
//! Commit order: graph record first, then vector. A failed vector write is
//! compensated by undoing the graph write. Deletes run edges, vector, node.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;
use crate::edge::{Direction, EdgeId, Relationship};
use crate::embedding::EmbeddingProvider;
use crate::error::{KnowledgeError, Result};
use crate::graph::GraphStore;
use crate::node::{EmbeddingInput, NewNode, Node, NodeId, NodePatch, NodeType};
use crate::vector::{VectorHit, VectorIndex};

/// Hook run inside the commit, after embedding and before any store write
pub trait CommitCheck: Send + Sync {
    fn check(&self, view: &StoreView<'_>, candidate: &Node) -> Result<()>;
}

/// Consistent read access to both stores
///
/// Only handed out while the commit gate is held, so every node visible
/// through it has its vector.
pub struct StoreView<'a> {
    graph: &'a dyn GraphStore,
    vectors: &'a dyn VectorIndex,
}

impl<'a> StoreView<'a> {
    pub fn graph(&self) -> &'a dyn GraphStore {
        self.graph
    }

    pub fn vectors(&self) -> &'a dyn VectorIndex {
        self.vectors
    }

    /// Attach the stored embedding to a graph record
    fn join(&self, mut node: Node) -> Result<Node> {
        match self.vectors.get(&node.id)? {
            Some(vector) => {
                node.embedding = vector;
                Ok(node)
            }
            None => {
                log::error!(
                    "Invariant violation: node {} present in graph store but missing from vector index",
                    node.id
                );
                Err(KnowledgeError::invariant(format!(
                    "node {} has no vector",
                    node.id
                )))
            }
        }
    }

    /// Node with its embedding
    pub fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        self.graph.get_node(id)?.map(|n| self.join(n)).transpose()
    }

    pub fn node(&self, id: &NodeId) -> Result<Node> {
        self.get_node(id)?
            .ok_or_else(|| KnowledgeError::not_found(id.to_string()))
    }

    /// Every node with its embedding, oldest first
    pub fn nodes(&self) -> Result<Vec<Node>> {
        self.graph
            .nodes()?
            .into_iter()
            .map(|n| self.join(n))
            .collect()
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> Result<Vec<Node>> {
        self.graph
            .nodes()?
            .into_iter()
            .filter(|n| n.node_type() == node_type)
            .map(|n| self.join(n))
            .collect()
    }

    pub fn query(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorHit>> {
        self.vectors.query(vector, k, threshold)
    }
}

/// Consistency audit result
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConsistencyReport {
    /// Graph nodes that had no vector, removed with their edges
    pub incomplete_nodes_removed: Vec<NodeId>,
    /// Vectors without a graph node, removed by the audit
    pub orphan_vectors_removed: Vec<NodeId>,
}

impl ConsistencyReport {
    /// True when the audit found nothing to repair
    pub fn is_consistent(&self) -> bool {
        self.incomplete_nodes_removed.is_empty() && self.orphan_vectors_removed.is_empty()
    }
}

pub struct NodeRepository {
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
    commit_check: Option<Arc<dyn CommitCheck>>,
    writer: Mutex<()>,
    gate: RwLock<()>,
}

impl NodeRepository {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EmbeddingConfig,
    ) -> Self {
        Self {
            graph,
            vectors,
            embedder,
            config,
            commit_check: None,
            writer: Mutex::new(()),
            gate: RwLock::new(()),
        }
    }

    /// Run `check` before every create and update commit
    pub fn with_commit_check(mut self, check: Arc<dyn CommitCheck>) -> Self {
        self.commit_check = Some(check);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Run `f` against a consistent view of both stores
    pub fn read<R>(&self, f: impl FnOnce(&StoreView<'_>) -> R) -> R {
        let _gate = self.gate.read();
        f(&self.view())
    }

    fn view(&self) -> StoreView<'_> {
        StoreView {
            graph: self.graph.as_ref(),
            vectors: self.vectors.as_ref(),
        }
    }

    /// Call the provider with the configured timeout
    pub async fn embed(&self, input: &EmbeddingInput) -> Result<Vec<f32>> {
        let timeout = self.config.timeout();
        let vector = tokio::time::timeout(timeout, self.embedder.embed(input.modality, &input.content))
            .await
            .map_err(|_| {
                KnowledgeError::embedding(format!(
                    "{} timed out after {}ms",
                    self.embedder.name(),
                    timeout.as_millis()
                ))
            })??;

        if vector.is_empty() || vector.iter().any(|x| !x.is_finite()) {
            return Err(KnowledgeError::embedding(format!(
                "{} returned an unusable vector",
                self.embedder.name()
            )));
        }
        Ok(vector)
    }

    pub fn get(&self, id: &NodeId) -> Result<Node> {
        self.read(|view| view.node(id))
    }

    /// Embed, check, then commit to both stores
    pub async fn create(&self, new: NewNode) -> Result<Node> {
        new.validate()?;
        let _writer = self.writer.lock().await;

        let embedding = self.embed(&new.embedding_input()).await?;
        let node = new.into_node(embedding);
        self.commit_create(&node)?;

        log::debug!("Created {} node {} ({})", node.node_type(), node.id, node.name);
        Ok(node)
    }

    fn commit_create(&self, node: &Node) -> Result<()> {
        let _gate = self.gate.write();
        self.precheck(node)?;

        self.graph.put_node(node)?;
        if let Err(err) = self
            .vectors
            .upsert(node.id, node.embedding.clone(), node.stamp.modified_at)
        {
            log::warn!("Vector write for node {} failed, rolling back graph write: {}", node.id, err);
            if let Err(undo) = self.graph.remove_node(&node.id) {
                log::error!(
                    "Invariant violation: create of node {} left graph store without vector index entry (rollback failed: {})",
                    node.id,
                    undo
                );
                return Err(KnowledgeError::invariant(format!(
                    "create of {} half-committed: {}",
                    node.id, err
                )));
            }
            return Err(err);
        }
        Ok(())
    }

    /// Apply a patch, re-embedding only when the embedded content changed
    pub async fn update(&self, id: &NodeId, patch: NodePatch) -> Result<Node> {
        let _writer = self.writer.lock().await;

        let current = self.get(id)?;
        let mut updated = patch.apply_to(&current)?;
        if updated.embedding_input() != current.embedding_input() {
            updated.embedding = self.embed(&updated.embedding_input()).await?;
        }
        updated.stamp.touch();
        self.commit_update(&current, &updated)?;

        log::debug!("Updated node {} to version {}", updated.id, updated.version());
        Ok(updated)
    }

    fn commit_update(&self, current: &Node, updated: &Node) -> Result<()> {
        let _gate = self.gate.write();
        self.precheck(updated)?;

        self.graph.put_node(updated)?;
        if let Err(err) = self
            .vectors
            .upsert(updated.id, updated.embedding.clone(), updated.stamp.modified_at)
        {
            log::warn!("Vector write for node {} failed, restoring version {}: {}", updated.id, current.version(), err);
            if let Err(undo) = self.graph.put_node(current) {
                log::error!(
                    "Invariant violation: update of node {} left graph store at v{} and vector index at v{} (restore failed: {})",
                    updated.id,
                    updated.version(),
                    current.version(),
                    undo
                );
                return Err(KnowledgeError::invariant(format!(
                    "update of {} half-committed: {}",
                    updated.id, err
                )));
            }
            return Err(err);
        }
        Ok(())
    }

    fn precheck(&self, candidate: &Node) -> Result<()> {
        match &self.commit_check {
            Some(check) => check.check(&self.view(), candidate),
            None => Ok(()),
        }
    }

    /// Remove a node and every edge touching it
    pub async fn delete(&self, id: &NodeId) -> Result<Vec<Relationship>> {
        let _writer = self.writer.lock().await;
        self.commit_delete(id)
    }

    fn commit_delete(&self, id: &NodeId) -> Result<Vec<Relationship>> {
        let _gate = self.gate.write();
        if !self.graph.contains_node(id)? {
            return Err(KnowledgeError::not_found(id.to_string()));
        }
        let removed = self.graph.remove_edges_for(id)?;
        self.vectors.delete(id)?;
        self.graph.remove_node(id)?;

        log::debug!("Deleted node {} and {} edge(s)", id, removed.len());
        Ok(removed)
    }

    /// Store an edge; both endpoints must exist
    pub async fn relate(&self, edge: Relationship) -> Result<Relationship> {
        let _writer = self.writer.lock().await;
        self.exclusive(|graph| graph.add_edge(edge))
    }

    pub async fn unrelate(&self, id: &EdgeId) -> Result<Relationship> {
        let _writer = self.writer.lock().await;
        self.exclusive(|graph| {
            graph
                .remove_edge(id)?
                .ok_or_else(|| KnowledgeError::not_found(id.to_string()))
        })
    }

    fn exclusive<R>(&self, f: impl FnOnce(&dyn GraphStore) -> R) -> R {
        let _gate = self.gate.write();
        f(self.graph.as_ref())
    }

    pub fn relationships(&self, id: &NodeId, direction: Direction) -> Result<Vec<Relationship>> {
        self.read(|view| view.graph().relationships(id, direction))
    }

    /// Compare both stores and undo any half-applied commit
    ///
    /// Orphan vectors are the residue of an interrupted delete. Nodes
    /// without vectors are the residue of an interrupted create (or of a
    /// vector record dropped as unreadable on load); they are deleted
    /// together with their edges, completing the compensating rollback.
    pub async fn check_consistency(&self) -> Result<ConsistencyReport> {
        let _writer = self.writer.lock().await;
        self.audit()
    }

    /// Same audit for callers that already own the stores exclusively
    pub(crate) fn audit(&self) -> Result<ConsistencyReport> {
        let _gate = self.gate.write();
        let mut report = ConsistencyReport::default();

        for node in self.graph.nodes()? {
            if !self.vectors.contains(&node.id)? {
                log::warn!(
                    "Node {} ({}) has no vector; removing incomplete record",
                    node.id,
                    node.name
                );
                self.graph.remove_edges_for(&node.id)?;
                self.graph.remove_node(&node.id)?;
                report.incomplete_nodes_removed.push(node.id);
            }
        }
        if !report.incomplete_nodes_removed.is_empty() {
            log::info!(
                "Removed {} incomplete node(s)",
                report.incomplete_nodes_removed.len()
            );
        }

        for id in self.vectors.ids()? {
            if !self.graph.contains_node(&id)? {
                self.vectors.delete(&id)?;
                report.orphan_vectors_removed.push(id);
            }
        }
        if !report.orphan_vectors_removed.is_empty() {
            log::info!(
                "Removed {} orphan vector(s)",
                report.orphan_vectors_removed.len()
            );
        }
        Ok(report)
    }

    pub fn flush(&self) -> Result<()> {
        self.graph.flush()?;
        self.vectors.flush()
    }
}
