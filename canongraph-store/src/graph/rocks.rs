//! RocksDB-backed graph store
//!
//! Records are JSON under `node:{id}` and `edge:{source}:{target}:{type}`.
//! Everything is loaded into an in-memory cache on open; writes go to
//! RocksDB first, then the cache.

use std::path::Path;
use std::sync::Arc;

use rocksdb::DB;

use super::{GraphStore, MemoryGraphStore};
use crate::edge::{Direction, EdgeId, Relationship};
use crate::error::Result;
use crate::node::{Node, NodeId};
use crate::storage;

const NODE_PREFIX: &str = "node:";
const EDGE_PREFIX: &str = "edge:";

pub struct RocksGraphStore {
    db: Arc<DB>,
    cache: MemoryGraphStore,
}

impl RocksGraphStore {
    /// Open the store at `path`, loading existing records
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = storage::open_db(path)?;
        let store = Self {
            db,
            cache: MemoryGraphStore::new(),
        };
        store.load_cache()?;
        Ok(store)
    }

    fn load_cache(&self) -> Result<()> {
        let mut skipped = 0;

        for (key, value) in storage::scan_prefix(&self.db, NODE_PREFIX)? {
            // Gracefully handle deserialization errors
            match serde_json::from_slice::<Node>(&value) {
                Ok(node) => self.cache.put_node(&node)?,
                Err(e) => {
                    log::warn!("Failed to deserialize node {}: {}. Skipping.", key, e);
                    skipped += 1;
                }
            }
        }

        for (key, value) in storage::scan_prefix(&self.db, EDGE_PREFIX)? {
            let edge = match serde_json::from_slice::<Relationship>(&value) {
                Ok(edge) => edge,
                Err(e) => {
                    log::warn!("Failed to deserialize edge {}: {}. Skipping.", key, e);
                    skipped += 1;
                    continue;
                }
            };
            if !self.cache.contains_node(&edge.source)? || !self.cache.contains_node(&edge.target)? {
                log::warn!("Edge {} references a missing node. Skipping.", key);
                skipped += 1;
                continue;
            }
            self.cache.put_edge(&edge)?;
        }

        log::info!(
            "Loaded {} nodes and {} edges from disk",
            self.cache.node_count(),
            self.cache.edge_count()
        );
        if skipped > 0 {
            log::warn!("Skipped {} records due to unreadable or dangling data", skipped);
        }
        Ok(())
    }

    fn node_key(id: &NodeId) -> String {
        format!("{}{}", NODE_PREFIX, id)
    }

    fn edge_key(id: &EdgeId) -> String {
        format!("{}{}", EDGE_PREFIX, id)
    }
}

impl GraphStore for RocksGraphStore {
    fn put_node(&self, node: &Node) -> Result<()> {
        let record = node.without_embedding();
        self.db
            .put(Self::node_key(&node.id).as_bytes(), serde_json::to_vec(&record)?)?;
        self.cache.put_node(&record)
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        self.cache.get_node(id)
    }

    fn remove_node(&self, id: &NodeId) -> Result<bool> {
        self.db.delete(Self::node_key(id).as_bytes())?;
        self.cache.remove_node(id)
    }

    fn nodes(&self) -> Result<Vec<Node>> {
        self.cache.nodes()
    }

    fn node_count(&self) -> usize {
        self.cache.node_count()
    }

    fn put_edge(&self, edge: &Relationship) -> Result<()> {
        self.db
            .put(Self::edge_key(&edge.id).as_bytes(), serde_json::to_vec(edge)?)?;
        self.cache.put_edge(edge)
    }

    fn get_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        self.cache.get_edge(id)
    }

    fn remove_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        self.db.delete(Self::edge_key(id).as_bytes())?;
        self.cache.remove_edge(id)
    }

    fn edges_of(&self, id: &NodeId, direction: Direction) -> Result<Vec<Relationship>> {
        self.cache.edges_of(id, direction)
    }

    fn edges(&self) -> Result<Vec<Relationship>> {
        self.cache.edges()
    }

    fn edge_count(&self) -> usize {
        self.cache.edge_count()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
