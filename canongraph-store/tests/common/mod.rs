//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canongraph_store::{
    Direction, EdgeId, EmbeddingProvider, GraphStore, KnowledgeConfig, KnowledgeError,
    KnowledgeGraph, MemoryGraphStore, MemoryVectorIndex, Modality, Node, NodeId, Relationship,
    Result, VectorHit, VectorIndex,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Provider returning registered vectors, keyed by the first line of the
/// content (the node name, or the whole query text)
pub struct MapEmbedder {
    vectors: DashMap<String, Vec<f32>>,
    dimension: usize,
    offline: AtomicBool,
    delay_ms: AtomicU64,
}

impl MapEmbedder {
    pub fn new(dimension: usize) -> Arc<Self> {
        Arc::new(Self {
            vectors: DashMap::new(),
            dimension,
            offline: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        })
    }

    pub fn set(&self, key: &str, vector: Vec<f32>) {
        self.vectors.insert(key.to_string(), vector);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for MapEmbedder {
    async fn embed(&self, _modality: Modality, content: &str) -> Result<Vec<f32>> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(KnowledgeError::embedding("provider offline"));
        }
        let key = content.lines().next().unwrap_or_default();
        self.vectors
            .get(key)
            .map(|v| v.clone())
            .ok_or_else(|| KnowledgeError::embedding(format!("no vector for {:?}", key)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "map"
    }
}

/// Vector index that can be switched to refuse writes
#[derive(Default)]
pub struct FailingVectorIndex {
    inner: MemoryVectorIndex,
    failing: AtomicBool,
}

impl FailingVectorIndex {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl VectorIndex for FailingVectorIndex {
    fn upsert(&self, id: NodeId, vector: Vec<f32>, modified_at: DateTime<Utc>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KnowledgeError::invalid_input("vector index unavailable"));
        }
        self.inner.upsert(id, vector, modified_at)
    }

    fn delete(&self, id: &NodeId) -> Result<bool> {
        self.inner.delete(id)
    }

    fn query(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorHit>> {
        self.inner.query(vector, k, threshold)
    }

    fn get(&self, id: &NodeId) -> Result<Option<Vec<f32>>> {
        self.inner.get(id)
    }

    fn ids(&self) -> Result<Vec<NodeId>> {
        self.inner.ids()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }
}

/// Graph store that refuses edge writes once its allowance is spent
pub struct EdgeLimitedGraphStore {
    inner: MemoryGraphStore,
    edges_left: AtomicUsize,
}

impl EdgeLimitedGraphStore {
    pub fn new(edges_allowed: usize) -> Self {
        Self {
            inner: MemoryGraphStore::new(),
            edges_left: AtomicUsize::new(edges_allowed),
        }
    }
}

impl GraphStore for EdgeLimitedGraphStore {
    fn put_node(&self, node: &Node) -> Result<()> {
        self.inner.put_node(node)
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        self.inner.get_node(id)
    }

    fn remove_node(&self, id: &NodeId) -> Result<bool> {
        self.inner.remove_node(id)
    }

    fn nodes(&self) -> Result<Vec<Node>> {
        self.inner.nodes()
    }

    fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    fn put_edge(&self, edge: &Relationship) -> Result<()> {
        let allowed = self
            .edges_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(KnowledgeError::invalid_input("edge storage unavailable"));
        }
        self.inner.put_edge(edge)
    }

    fn get_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        self.inner.get_edge(id)
    }

    fn remove_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        self.inner.remove_edge(id)
    }

    fn edges_of(&self, id: &NodeId, direction: Direction) -> Result<Vec<Relationship>> {
        self.inner.edges_of(id, direction)
    }

    fn edges(&self) -> Result<Vec<Relationship>> {
        self.inner.edges()
    }

    fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }
}

/// Unit vector in the x/y plane at `degrees`; cosine between two of these
/// is the cosine of the angle between them
pub fn at(degrees: f32) -> Vec<f32> {
    let radians = degrees.to_radians();
    vec![radians.cos(), radians.sin(), 0.0]
}

/// Unit vector along z, orthogonal to every [`at`] vector
pub fn z() -> Vec<f32> {
    vec![0.0, 0.0, 1.0]
}

/// Config for tests: no embedding cache so provider faults are visible
pub fn test_config() -> KnowledgeConfig {
    let mut config = KnowledgeConfig::default();
    config.embedding.cache = false;
    config
}

pub fn graph(embedder: Arc<MapEmbedder>) -> KnowledgeGraph {
    KnowledgeGraph::in_memory(embedder, test_config())
}

pub fn graph_with_index(embedder: Arc<MapEmbedder>, index: Arc<FailingVectorIndex>) -> KnowledgeGraph {
    KnowledgeGraph::with_stores(
        Arc::new(MemoryGraphStore::new()),
        index,
        embedder,
        test_config(),
    )
}
