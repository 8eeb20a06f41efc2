//! Store configuration
//!
//! All thresholds are configurable defaults. The duplicate (0.95), style
//! drift (0.7) and clustering (0.7) values are uncalibrated starting points;
//! tune them against the embedding model actually deployed.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub search: SearchConfig,
    pub validation: ValidationConfig,
    pub patterns: PatternConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
}

impl KnowledgeConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: KnowledgeConfig = serde_json::from_str(&raw)?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }
}

/// Search defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum results to return (default: 10)
    pub limit: usize,
    /// Minimum similarity for primary hits (default: 0.0)
    pub threshold: f32,
    /// Follow similar_to/references edges from primary hits (default: true)
    pub expand_graph: bool,
    /// Multiplier applied to expanded hits (default: 0.8)
    pub expansion_discount: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.0,
            expand_graph: true,
            expansion_discount: 0.8,
        }
    }
}

/// Canon validation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Average similarity to the style baseline below which drift is reported (default: 0.7)
    pub style_drift_threshold: f32,
    /// Similarity at or above which another node is a possible duplicate (default: 0.95)
    pub duplicate_threshold: f32,
    /// Tag marking style baseline nodes (default: "style-baseline")
    pub style_baseline_tag: String,
    /// Validate against global constraints before every create/update (default: true)
    pub validate_on_write: bool,
    /// Maximum duplicate hits reported (default: 5)
    pub max_duplicates: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            style_drift_threshold: 0.7,
            duplicate_threshold: 0.95,
            style_baseline_tag: "style-baseline".to_string(),
            validate_on_write: true,
            max_duplicates: 5,
        }
    }
}

/// Pattern extraction defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Similarity to the seed a member must exceed (default: 0.7)
    pub min_similarity: f32,
    /// Smallest cluster reported (default: 2, never below 2)
    pub min_frequency: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.7,
            min_frequency: 2,
        }
    }
}

/// Embedding provider call settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Per-call timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Memoize provider results (default: true)
    pub cache: bool,
    /// Most recent results kept when caching (default: 4096)
    pub cache_capacity: usize,
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            cache: true,
            cache_capacity: 4096,
        }
    }
}

/// Vector index tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Below this many vectors queries use an exact scan (default: 512)
    pub hnsw_min_points: usize,
    /// HNSW construction breadth (default: 100)
    pub ef_construction: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            hnsw_min_points: 512,
            ef_construction: 100,
        }
    }
}
