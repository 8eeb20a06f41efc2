//! HNSW vector index with optional RocksDB persistence
//!
//! Vectors live in a DashMap (and under `vec:{id}` in RocksDB when
//! persistent). Small indexes are scanned exactly. Past
//! `hnsw_min_points` vectors an instant-distance graph is rebuilt lazily
//! after writes and used for top-k candidates; when fewer than `k`
//! candidates clear the threshold the query falls back to an exact scan.
//!
//! Every write bumps a generation counter. A built graph is tagged with
//! the generation it was snapshotted at and is only served while that
//! generation is current; rebuilds are serialized on the graph lock.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use instant_distance::{Builder, HnswMap, Point, Search};
use parking_lot::RwLock;
use rocksdb::DB;

use super::{check_vector, cosine_similarity, rank, Scored, VectorHit, VectorIndex, VectorRecord};
use crate::config::VectorConfig;
use crate::error::Result;
use crate::node::NodeId;
use crate::storage;

const KEY_PREFIX: &str = "vec:";
const BUILD_SEED: u64 = 0x5eed;

/// HNSW point wrapper
#[derive(Clone)]
struct VectorPoint(Vec<f32>);

impl Point for VectorPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance = 1 - similarity (HNSW finds minimum)
        1.0 - cosine_similarity(&self.0, &other.0)
    }
}

type Graph = Arc<HnswMap<VectorPoint, NodeId>>;

/// Graph built from the entries as of `generation`
struct BuiltGraph {
    generation: u64,
    graph: Option<Graph>,
}

pub struct HnswVectorIndex {
    entries: DashMap<NodeId, VectorRecord>,
    dimension: RwLock<Option<usize>>,
    built: RwLock<Option<BuiltGraph>>,
    generation: AtomicU64,
    db: Option<Arc<DB>>,
    config: VectorConfig,
}

impl HnswVectorIndex {
    /// Volatile index
    pub fn in_memory(config: VectorConfig) -> Self {
        Self {
            entries: DashMap::new(),
            dimension: RwLock::new(None),
            built: RwLock::new(None),
            generation: AtomicU64::new(0),
            db: None,
            config,
        }
    }

    /// Persistent index at `path`, loading existing vectors
    pub fn open(path: impl AsRef<Path>, config: VectorConfig) -> Result<Self> {
        let db = storage::open_db(path)?;
        let mut index = Self::in_memory(config);
        index.load(&db)?;
        index.db = Some(db);
        Ok(index)
    }

    fn load(&self, db: &DB) -> Result<()> {
        let mut skipped = 0;
        let mut dimension = self.dimension.write();

        for (suffix, value) in storage::scan_prefix(db, KEY_PREFIX)? {
            let id = match suffix.parse::<NodeId>() {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("Bad vector key vec:{}: {}. Skipping.", suffix, e);
                    skipped += 1;
                    continue;
                }
            };

            // Gracefully handle deserialization errors
            let record = match bincode::deserialize::<VectorRecord>(&value) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Failed to deserialize vector {}: {}. Skipping.", id, e);
                    skipped += 1;
                    continue;
                }
            };

            if check_vector(&record.vector, *dimension).is_err() {
                log::warn!("Vector {} has an inconsistent shape. Skipping.", id);
                skipped += 1;
                continue;
            }
            *dimension = Some(record.vector.len());
            self.entries.insert(id, record);
        }

        if !self.entries.is_empty() {
            log::info!("Loaded {} vectors from disk", self.entries.len());
        }
        if skipped > 0 {
            log::warn!("Skipped {} vectors due to unreadable records", skipped);
        }
        Ok(())
    }

    fn key(id: &NodeId) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }

    fn exact(&self, vector: &[f32], k: usize, threshold: f32) -> Vec<VectorHit> {
        let scored = self
            .entries
            .iter()
            .map(|entry| Scored {
                node_id: *entry.key(),
                similarity: cosine_similarity(vector, &entry.value().vector),
                modified_at_ms: entry.value().modified_at_ms,
            })
            .collect();
        rank(scored, k, threshold)
    }

    /// Current HNSW graph, rebuilding if writes happened since the last build
    fn graph(&self) -> Option<Graph> {
        if let Some(built) = self.built.read().as_ref() {
            if built.generation == self.generation.load(Ordering::Acquire) {
                return built.graph.clone();
            }
        }

        let mut slot = self.built.write();
        // Writes insert before bumping, so the snapshot below holds at
        // least everything up to `generation`
        let generation = self.generation.load(Ordering::Acquire);
        if let Some(built) = slot.as_ref() {
            if built.generation == generation {
                return built.graph.clone();
            }
        }

        let graph = self.build();
        *slot = Some(BuiltGraph {
            generation,
            graph: graph.clone(),
        });
        graph
    }

    fn build(&self) -> Option<Graph> {
        let mut snapshot: Vec<(NodeId, Vec<f32>)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().vector.clone()))
            .collect();
        if snapshot.is_empty() {
            return None;
        }
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));

        let (values, points): (Vec<NodeId>, Vec<VectorPoint>) = snapshot
            .into_iter()
            .map(|(id, vector)| (id, VectorPoint(vector)))
            .unzip();

        log::debug!("Rebuilding HNSW index over {} vectors", points.len());
        Some(Arc::new(
            Builder::default()
                .ef_construction(self.config.ef_construction)
                .seed(BUILD_SEED)
                .build(points, values),
        ))
    }

    fn approximate(&self, vector: &[f32], k: usize, threshold: f32) -> Option<Vec<VectorHit>> {
        let graph = self.graph()?;
        let query_point = VectorPoint(vector.to_vec());
        let mut search = Search::default();

        let scored: Vec<Scored> = graph
            .search(&query_point, &mut search)
            .filter_map(|candidate| {
                let id = *candidate.value;
                // Entries removed since the last build are skipped
                let record = self.entries.get(&id)?;
                Some(Scored {
                    node_id: id,
                    similarity: cosine_similarity(vector, &record.vector),
                    modified_at_ms: record.modified_at_ms,
                })
            })
            .collect();

        let hits = rank(scored, k, threshold);
        (hits.len() == k).then_some(hits)
    }
}

impl VectorIndex for HnswVectorIndex {
    fn upsert(&self, id: NodeId, vector: Vec<f32>, modified_at: DateTime<Utc>) -> Result<()> {
        let mut dimension = self.dimension.write();
        check_vector(&vector, *dimension)?;

        let record = VectorRecord {
            vector,
            modified_at_ms: modified_at.timestamp_millis(),
        };
        if let Some(db) = &self.db {
            db.put(Self::key(&id).as_bytes(), bincode::serialize(&record)?)?;
        }

        *dimension = Some(record.vector.len());
        self.entries.insert(id, record);
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn delete(&self, id: &NodeId) -> Result<bool> {
        if let Some(db) = &self.db {
            db.delete(Self::key(id).as_bytes())?;
        }
        let existed = self.entries.remove(id).is_some();
        if existed {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        Ok(existed)
    }

    fn query(&self, vector: &[f32], k: usize, threshold: f32) -> Result<Vec<VectorHit>> {
        check_vector(vector, *self.dimension.read())?;
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if self.entries.len() >= self.config.hnsw_min_points {
            if let Some(hits) = self.approximate(vector, k, threshold) {
                return Ok(hits);
            }
        }
        Ok(self.exact(vector, k, threshold))
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

    fn flush(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(angle: f32) -> Vec<f32> {
        vec![angle.cos(), angle.sin()]
    }

    #[test]
    fn test_small_index_is_exact() {
        let index = HnswVectorIndex::in_memory(VectorConfig::default());
        let near = NodeId::new();
        let far = NodeId::new();
        index.upsert(near, unit(0.1), Utc::now()).unwrap();
        index.upsert(far, unit(1.4), Utc::now()).unwrap();

        let hits = index.query(&unit(0.0), 2, 0.0).unwrap();
        assert_eq!(hits[0].node_id, near);
        assert_eq!(hits[1].node_id, far);
    }

    #[test]
    fn test_hnsw_path_finds_nearest() {
        let config = VectorConfig {
            hnsw_min_points: 8,
            ef_construction: 50,
        };
        let index = HnswVectorIndex::in_memory(config);
        let mut ids = Vec::new();
        for i in 0..64 {
            let id = NodeId::new();
            index.upsert(id, unit(i as f32 * 0.02), Utc::now()).unwrap();
            ids.push(id);
        }

        let hits = index.query(&unit(0.0), 3, 0.0).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].node_id, ids[0]);
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits[1].similarity >= hits[2].similarity);
    }

    #[test]
    fn test_deleted_vectors_not_returned_before_rebuild() {
        let config = VectorConfig {
            hnsw_min_points: 2,
            ef_construction: 20,
        };
        let index = HnswVectorIndex::in_memory(config);
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();
        index.upsert(a, unit(0.0), Utc::now()).unwrap();
        index.upsert(b, unit(0.5), Utc::now()).unwrap();
        index.upsert(c, unit(1.0), Utc::now()).unwrap();
        index.query(&unit(0.0), 1, 0.0).unwrap();

        index.delete(&a).unwrap();
        let hits = index.query(&unit(0.0), 3, 0.0).unwrap();
        assert!(hits.iter().all(|h| h.node_id != a));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_rebuild_after_write_sees_new_nearest() {
        let config = VectorConfig {
            hnsw_min_points: 2,
            ef_construction: 20,
        };
        let index = HnswVectorIndex::in_memory(config);
        for i in 1..10 {
            index.upsert(NodeId::new(), unit(i as f32 * 0.1), Utc::now()).unwrap();
        }
        index.query(&unit(0.0), 1, 0.0).unwrap();

        let newest = NodeId::new();
        index.upsert(newest, unit(0.0), Utc::now()).unwrap();
        let hits = index.query(&unit(0.0), 1, 0.0).unwrap();
        assert_eq!(hits[0].node_id, newest);
    }

    #[test]
    fn test_queries_racing_writes_settle_on_latest_graph() {
        let config = VectorConfig {
            hnsw_min_points: 4,
            ef_construction: 20,
        };
        let index = HnswVectorIndex::in_memory(config);
        let ids: Vec<NodeId> = (0..48).map(|_| NodeId::new()).collect();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for (i, id) in ids.iter().enumerate() {
                    index.upsert(*id, unit(1.5 - i as f32 * 0.03), Utc::now()).unwrap();
                }
            });
            for _ in 0..3 {
                scope.spawn(|| {
                    for _ in 0..40 {
                        index.query(&unit(0.0), 1, 0.0).unwrap();
                    }
                });
            }
        });

        let latest = ids[ids.len() - 1];
        let first = index.query(&unit(0.0), 1, 0.0).unwrap();
        assert_eq!(first[0].node_id, latest);
        assert_eq!(first, index.exact(&unit(0.0), 1, 0.0));
        assert_eq!(first, index.query(&unit(0.0), 1, 0.0).unwrap());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let id = NodeId::new();
        {
            let index = HnswVectorIndex::open(dir.path(), VectorConfig::default()).unwrap();
            index.upsert(id, vec![0.6, 0.8], Utc::now()).unwrap();
            index.upsert(NodeId::new(), vec![1.0, 0.0], Utc::now()).unwrap();
            index.flush().unwrap();
        }

        let index = HnswVectorIndex::open(dir.path(), VectorConfig::default()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), Some(2));
        assert_eq!(index.get(&id).unwrap(), Some(vec![0.6, 0.8]));
    }

    #[test]
    fn test_corrupt_record_skipped_on_load() {
        let dir = TempDir::new().unwrap();
        {
            let index = HnswVectorIndex::open(dir.path(), VectorConfig::default()).unwrap();
            index.upsert(NodeId::new(), vec![1.0, 0.0], Utc::now()).unwrap();
            let db = index.db.as_ref().unwrap();
            db.put(format!("vec:{}", NodeId::new()).as_bytes(), b"garbage").unwrap();
        }

        let index = HnswVectorIndex::open(dir.path(), VectorConfig::default()).unwrap();
        assert_eq!(index.len(), 1);
    }
}
