//! Pattern extraction
//!
//! Greedy single-linkage clustering over node embeddings. Nodes are visited
//! oldest first (ties by id); each unclustered node seeds a cluster of every
//! later unclustered node whose similarity to the seed exceeds the
//! threshold. Fixed iteration order makes the output repeatable.

use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::node::{Node, NodeId, NodeType};
use crate::vector::cosine_similarity;

/// A recurring cluster of similar nodes of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// `pattern:{type}:{seed}`, stable across runs
    pub id: String,
    pub node_type: NodeType,
    /// Representative name, taken from the seed
    pub name: String,
    /// Seed first, then members in visit order
    pub members: Vec<NodeId>,
    /// Cluster size
    pub frequency: usize,
    /// Mean similarity of the members to the seed
    pub similarity: f32,
    /// Tags carried by every member
    pub shared_tags: Vec<String>,
}

impl Pattern {
    pub fn seed(&self) -> NodeId {
        self.members[0]
    }
}

pub struct PatternExtractor {
    config: PatternConfig,
}

impl PatternExtractor {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Cluster `nodes` with the configured thresholds
    ///
    /// With no `node_type`, every type except `pattern` is clustered on its
    /// own, in [`NodeType::ALL`] order.
    pub fn extract(&self, nodes: &[Node], node_type: Option<NodeType>, min_frequency: Option<usize>) -> Vec<Pattern> {
        self.extract_with(
            nodes,
            node_type,
            self.config.min_similarity,
            min_frequency.unwrap_or(self.config.min_frequency),
        )
    }

    pub fn extract_with(
        &self,
        nodes: &[Node],
        node_type: Option<NodeType>,
        min_similarity: f32,
        min_frequency: usize,
    ) -> Vec<Pattern> {
        let min_frequency = min_frequency.max(2);
        let types: Vec<NodeType> = match node_type {
            Some(t) => vec![t],
            None => NodeType::ALL
                .iter()
                .copied()
                .filter(|t| *t != NodeType::Pattern)
                .collect(),
        };

        types
            .into_iter()
            .flat_map(|t| cluster_type(nodes, t, min_similarity, min_frequency))
            .collect()
    }
}

fn cluster_type(nodes: &[Node], node_type: NodeType, min_similarity: f32, min_frequency: usize) -> Vec<Pattern> {
    let mut candidates: Vec<&Node> = nodes
        .iter()
        .filter(|n| n.node_type() == node_type && !n.embedding.is_empty())
        .collect();
    candidates.sort_by(|a, b| {
        a.stamp
            .created_at
            .cmp(&b.stamp.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut clustered = vec![false; candidates.len()];
    let mut patterns = Vec::new();

    for i in 0..candidates.len() {
        if clustered[i] {
            continue;
        }
        clustered[i] = true;
        let seed = candidates[i];
        let mut members = vec![seed];
        let mut similarities = Vec::new();

        for j in (i + 1)..candidates.len() {
            if clustered[j] {
                continue;
            }
            let similarity = cosine_similarity(&seed.embedding, &candidates[j].embedding);
            if similarity > min_similarity {
                clustered[j] = true;
                members.push(candidates[j]);
                similarities.push(similarity);
            }
        }

        if members.len() >= min_frequency {
            patterns.push(build_pattern(node_type, &members, &similarities));
        }
    }

    patterns
}

fn build_pattern(node_type: NodeType, members: &[&Node], similarities: &[f32]) -> Pattern {
    let seed = members[0];
    let shared_tags = seed
        .tags
        .iter()
        .filter(|tag| members.iter().all(|m| m.has_tag(tag)))
        .fold(Vec::new(), |mut acc: Vec<String>, tag| {
            if !acc.contains(tag) {
                acc.push(tag.clone());
            }
            acc
        });

    Pattern {
        id: format!("pattern:{}:{}", node_type, seed.id),
        node_type,
        name: format!("Recurring {}: {}", node_type, seed.name),
        members: members.iter().map(|m| m.id).collect(),
        frequency: members.len(),
        similarity: similarities.iter().sum::<f32>() / similarities.len() as f32,
        shared_tags,
    }
}
