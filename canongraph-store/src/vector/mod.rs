//! Vector index port and adapters
//!
//! Nearest-neighbor retrieval over node embeddings by cosine similarity.
//! Results are ordered by similarity descending, then most recently
//! modified first, then node id, so identical queries over identical
//! contents always return identical lists.

mod hnsw;
mod memory;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};
use crate::node::NodeId;

pub use hnsw::HnswVectorIndex;
pub use memory::MemoryVectorIndex;

/// One nearest-neighbor result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub node_id: NodeId,
    pub similarity: f32,
}

/// Stored vector plus the modification stamp used for tie-breaking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub vector: Vec<f32>,
    pub modified_at_ms: i64,
}

/// Nearest-neighbor index keyed by node id
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector for `id`
    fn upsert(&self, id: NodeId, vector: Vec<f32>, modified_at: DateTime<Utc>) -> Result<()>;

    /// Remove the vector for `id`; returns whether it existed
    fn delete(&self, id: &NodeId) -> Result<bool>;

    /// Up to `k` nodes with similarity >= `threshold`, best first
    fn query(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorHit>>;

    /// Stored vector for `id`
    fn get(&self, id: &NodeId) -> Result<Option<Vec<f32>>>;

    /// All indexed ids
    fn ids(&self) -> Result<Vec<NodeId>>;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &NodeId) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Dimension fixed by the first vector, if any
    fn dimension(&self) -> Option<usize>;

    /// Persist buffered writes
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Reject vectors that would poison similarity ordering
pub(crate) fn check_vector(vector: &[f32], dimension: Option<usize>) -> Result<()> {
    if vector.is_empty() {
        return Err(KnowledgeError::invalid_input("empty vector"));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(KnowledgeError::invalid_input("vector contains non-finite values"));
    }
    match dimension {
        Some(expected) if expected != vector.len() => Err(KnowledgeError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Scored candidate before truncation
pub(crate) struct Scored {
    pub node_id: NodeId,
    pub similarity: f32,
    pub modified_at_ms: i64,
}

/// Filter by threshold, order deterministically, keep the best `k`
pub(crate) fn rank(mut scored: Vec<Scored>, k: usize, threshold: f32) -> Vec<VectorHit> {
    scored.retain(|s| s.similarity >= threshold);
    scored.sort_by(compare_scored);
    scored.truncate(k);
    scored
        .into_iter()
        .map(|s| VectorHit {
            node_id: s.node_id,
            similarity: s.similarity,
        })
        .collect()
}

fn compare_scored(a: &Scored, b: &Scored) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| b.modified_at_ms.cmp(&a.modified_at_ms))
        .then_with(|| a.node_id.cmp(&b.node_id))
}
