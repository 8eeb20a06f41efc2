//! Exact in-memory vector index

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use super::{check_vector, cosine_similarity, rank, Scored, VectorHit, VectorIndex, VectorRecord};
use crate::error::Result;
use crate::node::NodeId;

/// Linear-scan index; exact results, O(n) per query
#[derive(Default)]
pub struct MemoryVectorIndex {
    entries: DashMap<NodeId, VectorRecord>,
    dimension: RwLock<Option<usize>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for MemoryVectorIndex {
    fn upsert(&self, id: NodeId, vector: Vec<f32>, modified_at: DateTime<Utc>) -> Result<()> {
        let mut dimension = self.dimension.write();
        check_vector(&vector, *dimension)?;
        *dimension = Some(vector.len());
        self.entries.insert(
            id,
            VectorRecord {
                vector,
                modified_at_ms: modified_at.timestamp_millis(),
            },
        );
        Ok(())
    }

    fn delete(&self, id: &NodeId) -> Result<bool> {
        Ok(self.entries.remove(id).is_some())
    }

    fn query(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorHit>> {
        check_vector(vector, *self.dimension.read())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let scored = self
            .entries
            .iter()
            .map(|entry| Scored {
                node_id: *entry.key(),
                similarity: cosine_similarity(vector, &entry.value().vector),
                modified_at_ms: entry.value().modified_at_ms,
            })
            .collect();

        Ok(rank(scored, k, threshold))
    }

    fn get(&self, id: &NodeId) -> Result<Option<Vec<f32>>> {
        Ok(self.entries.get(id).map(|e| e.vector.clone()))
    }

    fn ids(&self) -> Result<Vec<NodeId>> {
        let mut ids: Vec<NodeId> = self.entries.iter().map(|e| *e.key()).collect();
        ids.sort();
        Ok(ids)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimension(&self) -> Option<usize> {
        *self.dimension.read()
    }
}
