//! Graph store port and adapters
//!
//! Nodes are stored without their embedding (the vector index owns
//! vectors). Edges are owned by the store, never by an endpoint.

mod memory;
mod rocks;

use std::collections::{HashSet, VecDeque};

use crate::edge::{Direction, EdgeId, Relationship, RelationshipType};
use crate::error::{KnowledgeError, Result};
use crate::node::{Node, NodeId};

pub use memory::MemoryGraphStore;
pub use rocks::RocksGraphStore;

/// Typed node/edge persistence
///
/// Implementors provide raw record access; dangling-edge checks, cascades
/// and traversal are provided on top.
pub trait GraphStore: Send + Sync {
    /// Insert or replace a node record
    fn put_node(&self, node: &Node) -> Result<()>;

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>>;

    /// Remove a node record only; callers cascade edges first
    fn remove_node(&self, id: &NodeId) -> Result<bool>;

    /// All nodes, oldest first (ties by id)
    fn nodes(&self) -> Result<Vec<Node>>;

    fn node_count(&self) -> usize;

    /// Insert or replace an edge record without checking endpoints
    fn put_edge(&self, edge: &Relationship) -> Result<()>;

    fn get_edge(&self, id: &EdgeId) -> Result<Option<Relationship>>;

    fn remove_edge(&self, id: &EdgeId) -> Result<Option<Relationship>>;

    /// Edges incident to `id`, ordered by edge id
    fn edges_of(&self, id: &NodeId, direction: Direction) -> Result<Vec<Relationship>>;

    /// Every edge, ordered by edge id
    fn edges(&self) -> Result<Vec<Relationship>>;

    fn edge_count(&self) -> usize;

    /// Persist buffered writes
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn contains_node(&self, id: &NodeId) -> Result<bool> {
        Ok(self.get_node(id)?.is_some())
    }

    /// Store an edge after checking both endpoints exist
    fn add_edge(&self, edge: Relationship) -> Result<Relationship> {
        for endpoint in [edge.source, edge.target] {
            if !self.contains_node(&endpoint)? {
                return Err(KnowledgeError::DanglingReference {
                    edge: edge.id.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        self.put_edge(&edge)?;
        Ok(edge)
    }

    /// Relationships of a node in the given direction
    fn relationships(&self, id: &NodeId, direction: Direction) -> Result<Vec<Relationship>> {
        if !self.contains_node(id)? {
            return Err(KnowledgeError::not_found(id.to_string()));
        }
        self.edges_of(id, direction)
    }

    /// Delete every edge touching `id`, returning what was removed
    fn remove_edges_for(&self, id: &NodeId) -> Result<Vec<Relationship>> {
        let mut removed = Vec::new();
        for edge in self.edges_of(id, Direction::Both)? {
            if let Some(edge) = self.remove_edge(&edge.id)? {
                removed.push(edge);
            }
        }
        Ok(removed)
    }

    /// Breadth-first walk along outgoing edges
    ///
    /// Returns reached nodes in visit order, excluding `start`. Only edges
    /// whose type is in `kinds` are followed when a filter is given.
    fn traverse(
        &self,
        start: &NodeId,
        max_depth: usize,
        kinds: Option<&[RelationshipType]>,
    ) -> Result<Vec<Node>> {
        if !self.contains_node(start)? {
            return Err(KnowledgeError::not_found(start.to_string()));
        }

        let mut visited = HashSet::from([*start]);
        let mut queue = VecDeque::from([(*start, 0usize)]);
        let mut reached = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.edges_of(&current, Direction::Out)? {
                if kinds.is_some_and(|k| !k.contains(&edge.kind)) {
                    continue;
                }
                if !visited.insert(edge.target) {
                    continue;
                }
                if let Some(node) = self.get_node(&edge.target)? {
                    reached.push(node);
                    queue.push_back((edge.target, depth + 1));
                }
            }
        }

        Ok(reached)
    }
}

/// Order nodes oldest first, ties by id
pub(crate) fn sort_by_creation(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| {
        a.stamp
            .created_at
            .cmp(&b.stamp.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
