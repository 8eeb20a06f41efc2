//! Deterministic feature-hashing embedder
//!
//! Needs no model files or network. Tokens and adjacent token pairs are
//! hashed with BLAKE3 into signed buckets and the result is L2-normalized,
//! so texts sharing vocabulary land close together. Quality is far below a
//! learned model; use it offline, in tests, and as the server fallback.

use async_trait::async_trait;

use super::{EmbeddingProvider, Modality};
use crate::error::{KnowledgeError, Result};

/// Default dimension, matching BGE-Small-EN-v1.5
pub const DEFAULT_DIMENSION: usize = 384;

const BIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(KnowledgeError::invalid_input("embedding dimension must be > 0"));
        }
        Ok(Self { dimension })
    }

    /// Embed synchronously
    pub fn embed_text(&self, content: &str) -> Vec<f32> {
        let tokens = tokenize(content);
        let mut vector = vec![0.0_f32; self.dimension];

        for token in &tokens {
            self.add_feature(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let feature = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut vector, feature.as_bytes(), BIGRAM_WEIGHT);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = blake3::hash(feature);
        let bytes = hash.as_bytes();
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let value = u64::from_le_bytes(word);

        let bucket = (value % self.dimension as u64) as usize;
        let sign = if value >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

/// Lowercase alphanumeric runs of two or more characters
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() > 1)
        .map(String::from)
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    /// All modalities are hashed as text; image content is the asset path
    async fn embed(&self, _modality: Modality, content: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(content))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
