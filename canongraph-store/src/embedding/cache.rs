//! Memoizing embedding provider
//!
//! Wraps any provider with an LRU cache keyed by modality and a blake3
//! digest of the content, so re-validating or re-searching unchanged
//! content does not pay for a second provider call. The least recently
//! used entries are evicted once `capacity` is reached.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use super::{EmbeddingProvider, Modality};
use crate::error::Result;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(capacity) => capacity,
    None => panic!("capacity must be non-zero"),
};

type CacheKey = (Modality, [u8; 32]);

/// Embedding provider with caching
pub struct CachedProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<CacheKey, Vec<f32>>>,
}

impl CachedProvider {
    /// Cache at most `capacity` results (zero falls back to the default)
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(modality: Modality, content: &str) -> CacheKey {
        (modality, *blake3::hash(content.as_bytes()).as_bytes())
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.lock().len()
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

#[async_trait]
impl EmbeddingProvider for CachedProvider {
    async fn embed(&self, modality: Modality, content: &str) -> Result<Vec<f32>> {
        let key = Self::key(modality, content);
        let hit = self.cache.lock().get(&key).cloned();
        if let Some(cached) = hit {
            return Ok(cached);
        }

        // Failures are not cached; the caller decides whether to retry
        let embedding = self.inner.embed(modality, content).await?;
        self.cache.lock().put(key, embedding.clone());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
