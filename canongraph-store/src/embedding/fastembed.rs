//! Local ONNX embeddings via fastembed
//!
//! BGE-Small-EN-v1.5 (384 dimensions). Text and code share the model; the
//! image modality is not supported and fails with an embedding error.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{find_model_cache_dir, EmbeddingProvider, Modality};
use crate::error::{KnowledgeError, Result};

const BGE_SMALL_DIMENSION: usize = 384;

/// fastembed-backed provider
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
}

impl FastEmbedProvider {
    /// Load the model, downloading it into the cache directory on first use
    pub fn new(data_dir: Option<&Path>) -> Result<Self> {
        let cache_dir = find_model_cache_dir(data_dir);
        std::fs::create_dir_all(&cache_dir)?;

        let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
            .with_cache_dir(cache_dir.clone())
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| KnowledgeError::embedding(format!("Failed to load model: {}", e)))?;

        log::info!(
            "FastEmbed ready ({}d, cache {})",
            BGE_SMALL_DIMENSION,
            cache_dir.display()
        );

        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, modality: Modality, content: &str) -> Result<Vec<f32>> {
        if modality == Modality::Image {
            return Err(KnowledgeError::embedding(
                "fastembed text model cannot embed images",
            ));
        }

        let model = Arc::clone(&self.model);
        let text = content.to_string();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(vec![text], None))
            .await
            .map_err(|e| KnowledgeError::embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| KnowledgeError::embedding(format!("Failed to encode text: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| KnowledgeError::embedding("model returned no embedding"))
    }

    fn dimension(&self) -> usize {
        BGE_SMALL_DIMENSION
    }

    fn name(&self) -> &str {
        "fastembed-bge-small-en-v1.5"
    }
}
