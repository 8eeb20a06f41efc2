//! Embedding provider port and adapters
//!
//! The store never computes embeddings itself; it calls an
//! [`EmbeddingProvider`] injected at construction. Adapters:
//!
//! - [`HashingEmbedder`] - deterministic feature hashing, no model files
//! - [`CachedProvider`] - memoizing wrapper around any provider
//! - `FastEmbedProvider` - local BGE-Small-EN-v1.5 (feature `fastembed`)

mod cache;
mod discovery;
#[cfg(feature = "fastembed")]
mod fastembed;
mod hashing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use cache::CachedProvider;
pub use discovery::find_model_cache_dir;
#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedProvider;
pub use hashing::HashingEmbedder;

/// Kind of content being embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Code,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Code => "code",
        })
    }
}

/// Maps `(modality, content)` to a fixed-length vector
///
/// Implementations fail with `KnowledgeError::Embedding` on provider or
/// network failure. The dimension must stay constant for the lifetime of
/// the vector index the provider feeds.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one piece of content
    async fn embed(&self, modality: Modality, content: &str) -> Result<Vec<f32>>;

    /// Vector dimension produced by this provider
    fn dimension(&self) -> usize;

    /// Short identifier for logs and stats
    fn name(&self) -> &str {
        "embedding-provider"
    }
}
