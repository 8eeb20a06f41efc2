//! In-memory graph store

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use super::{sort_by_creation, GraphStore};
use crate::edge::{Direction, EdgeId, Relationship};
use crate::error::Result;
use crate::node::{Node, NodeId};

#[derive(Default)]
struct GraphState {
    nodes: HashMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Relationship>,
    outgoing: HashMap<NodeId, BTreeSet<EdgeId>>,
    incoming: HashMap<NodeId, BTreeSet<EdgeId>>,
}

/// Adjacency-indexed graph held behind one lock
#[derive(Default)]
pub struct MemoryGraphStore {
    state: RwLock<GraphState>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryGraphStore {
    fn put_node(&self, node: &Node) -> Result<()> {
        let record = node.without_embedding();
        self.state.write().nodes.insert(node.id, record);
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        Ok(self.state.read().nodes.get(id).cloned())
    }

    fn remove_node(&self, id: &NodeId) -> Result<bool> {
        let mut state = self.state.write();
        state.outgoing.remove(id);
        state.incoming.remove(id);
        Ok(state.nodes.remove(id).is_some())
    }

    fn nodes(&self) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = self.state.read().nodes.values().cloned().collect();
        sort_by_creation(&mut nodes);
        Ok(nodes)
    }

    fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    fn put_edge(&self, edge: &Relationship) -> Result<()> {
        let mut state = self.state.write();
        state
            .outgoing
            .entry(edge.source)
            .or_default()
            .insert(edge.id.clone());
        state
            .incoming
            .entry(edge.target)
            .or_default()
            .insert(edge.id.clone());
        state.edges.insert(edge.id.clone(), edge.clone());
        Ok(())
    }

    fn get_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        Ok(self.state.read().edges.get(id).cloned())
    }

    fn remove_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        let mut state = self.state.write();
        let Some(edge) = state.edges.remove(id) else {
            return Ok(None);
        };
        if let Some(out) = state.outgoing.get_mut(&edge.source) {
            out.remove(id);
        }
        if let Some(inc) = state.incoming.get_mut(&edge.target) {
            inc.remove(id);
        }
        Ok(Some(edge))
    }

    fn edges_of(&self, id: &NodeId, direction: Direction) -> Result<Vec<Relationship>> {
        let state = self.state.read();
        let mut ids: BTreeSet<&EdgeId> = BTreeSet::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            ids.extend(state.outgoing.get(id).into_iter().flatten());
        }
        if matches!(direction, Direction::In | Direction::Both) {
            ids.extend(state.incoming.get(id).into_iter().flatten());
        }
        Ok(ids
            .into_iter()
            .filter_map(|edge_id| state.edges.get(edge_id).cloned())
            .collect())
    }

    fn edges(&self) -> Result<Vec<Relationship>> {
        Ok(self.state.read().edges.values().cloned().collect())
    }

    fn edge_count(&self) -> usize {
        self.state.read().edges.len()
    }
}
