//! Hybrid search engine
//!
//! Vector similarity produces the primary hits; optional graph expansion
//! adds nodes reachable over one outgoing `similar_to` or `references`
//! edge at a discounted score.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::edge::{Direction, EdgeId, RelationshipType};
use crate::embedding::Modality;
use crate::error::{KnowledgeError, Result};
use crate::node::{EmbeddingInput, Node, NodeId, NodeType};
use crate::repository::{NodeRepository, StoreView};

const EXPANSION_EDGES: [RelationshipType; 2] =
    [RelationshipType::SimilarTo, RelationshipType::References];

/// A search request; unset options fall back to [`SearchConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticQuery {
    #[serde(default)]
    pub text: Option<String>,
    /// Precomputed query vector; wins over `text`
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Only return these node types (empty = all)
    #[serde(default)]
    pub node_types: Vec<NodeType>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub expand_graph: Option<bool>,
}

impl SemanticQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn embedding(embedding: Vec<f32>) -> Self {
        Self {
            embedding: Some(embedding),
            ..Self::default()
        }
    }

    pub fn node_type(mut self, node_type: NodeType) -> Self {
        self.node_types.push(node_type);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn expand_graph(mut self, expand: bool) -> Self {
        self.expand_graph = Some(expand);
        self
    }

    fn accepts(&self, node_type: NodeType) -> bool {
        self.node_types.is_empty() || self.node_types.contains(&node_type)
    }
}

/// Why a node matched the search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchReason {
    /// Direct vector hit
    Semantic { similarity: f32 },
    /// Reached over an edge from a primary hit
    Related {
        via: NodeId,
        edge: EdgeId,
        relationship: RelationshipType,
        strength: f32,
    },
}

/// Search result with score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched node (embedding omitted)
    pub node: Node,
    pub score: f32,
    pub reason: MatchReason,
}

impl SearchResult {
    pub fn is_primary(&self) -> bool {
        matches!(self.reason, MatchReason::Semantic { .. })
    }
}

pub struct SearchEngine {
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Resolve the query vector, then rank against a consistent view
    pub async fn search(&self, repository: &NodeRepository, query: &SemanticQuery) -> Result<Vec<SearchResult>> {
        let vector = match (&query.embedding, &query.text) {
            (Some(embedding), _) => embedding.clone(),
            (None, Some(text)) => {
                let input = EmbeddingInput {
                    modality: Modality::Text,
                    content: text.clone(),
                };
                repository.embed(&input).await.map_err(|e| match e {
                    KnowledgeError::Embedding(msg) => KnowledgeError::search_unavailable(msg),
                    other => other,
                })?
            }
            (None, None) => {
                return Err(KnowledgeError::invalid_input(
                    "search needs query text or an embedding",
                ))
            }
        };

        repository.read(|view| self.rank(view, &vector, query))
    }

    /// Primary vector hits plus optional graph expansion, best first
    pub fn rank(&self, view: &StoreView<'_>, vector: &[f32], query: &SemanticQuery) -> Result<Vec<SearchResult>> {
        let limit = query.limit.unwrap_or(self.config.limit);
        let threshold = query.threshold.unwrap_or(self.config.threshold);
        let expand = query.expand_graph.unwrap_or(self.config.expand_graph);
        if limit == 0 || view.vectors().is_empty() {
            return Ok(Vec::new());
        }

        // A type filter could starve a top-k query, so scan everything then
        let k = if query.node_types.is_empty() {
            limit
        } else {
            view.vectors().len()
        };

        let mut primary: Vec<(SearchResult, i64)> = Vec::new();
        for hit in view.query(vector, k, threshold)? {
            let Some(node) = view.graph().get_node(&hit.node_id)? else {
                continue;
            };
            if !query.accepts(node.node_type()) {
                continue;
            }
            let modified = node.stamp.modified_millis();
            primary.push((
                SearchResult {
                    node,
                    score: hit.similarity,
                    reason: MatchReason::Semantic {
                        similarity: hit.similarity,
                    },
                },
                modified,
            ));
            if primary.len() == limit {
                break;
            }
        }

        let expanded = if expand {
            self.expand(view, &primary, query)?
        } else {
            Vec::new()
        };

        let mut results = primary;
        results.extend(expanded);
        results.sort_by(|(a, a_modified), (b, b_modified)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.is_primary().cmp(&a.is_primary()))
                .then_with(|| b_modified.cmp(a_modified))
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        results.truncate(limit);

        Ok(results.into_iter().map(|(result, _)| result).collect())
    }

    fn expand(
        &self,
        view: &StoreView<'_>,
        primary: &[(SearchResult, i64)],
        query: &SemanticQuery,
    ) -> Result<Vec<(SearchResult, i64)>> {
        let primary_ids: HashSet<NodeId> = primary.iter().map(|(r, _)| r.node.id).collect();
        let mut best: HashMap<NodeId, (SearchResult, i64)> = HashMap::new();

        for (source, _) in primary {
            for edge in view.graph().edges_of(&source.node.id, Direction::Out)? {
                if !EXPANSION_EDGES.contains(&edge.kind) || primary_ids.contains(&edge.target) {
                    continue;
                }
                let score = source.score * edge.strength * self.config.expansion_discount;
                if best.get(&edge.target).is_some_and(|(r, _)| r.score >= score) {
                    continue;
                }
                let Some(node) = view.graph().get_node(&edge.target)? else {
                    continue;
                };
                if !query.accepts(node.node_type()) {
                    continue;
                }
                let modified = node.stamp.modified_millis();
                best.insert(
                    node.id,
                    (
                        SearchResult {
                            node,
                            score,
                            reason: MatchReason::Related {
                                via: source.node.id,
                                edge: edge.id.clone(),
                                relationship: edge.kind,
                                strength: edge.strength,
                            },
                        },
                        modified,
                    ),
                );
            }
        }

        Ok(best.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = SemanticQuery::text("lighthouse")
            .node_type(NodeType::Lore)
            .limit(3)
            .threshold(0.5)
            .expand_graph(false);
        assert_eq!(query.text.as_deref(), Some("lighthouse"));
        assert!(query.accepts(NodeType::Lore));
        assert!(!query.accepts(NodeType::Asset));
        assert_eq!(query.limit, Some(3));
    }

    #[test]
    fn test_query_deserializes_with_defaults() {
        let query: SemanticQuery =
            serde_json::from_str(r#"{"text": "cards", "node_types": ["design"]}"#).unwrap();
        assert_eq!(query.node_types, vec![NodeType::Design]);
        assert!(query.limit.is_none());
        assert!(query.accepts(NodeType::Design));
    }

    #[test]
    fn test_match_reason_serialization() {
        let json = serde_json::to_value(MatchReason::Semantic { similarity: 0.5 }).unwrap();
        assert_eq!(json["kind"], "semantic");
    }
}
