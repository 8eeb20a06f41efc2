//! Typed, directed, weighted relationships between nodes

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KnowledgeError, Result};
use crate::node::NodeId;

/// Relationship types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Uses,
    Generates,
    DependsOn,
    Implements,
    References,
    Extends,
    ConflictsWith,
    SimilarTo,
    VariantOf,
    PartOf,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 10] = [
        RelationshipType::Uses,
        RelationshipType::Generates,
        RelationshipType::DependsOn,
        RelationshipType::Implements,
        RelationshipType::References,
        RelationshipType::Extends,
        RelationshipType::ConflictsWith,
        RelationshipType::SimilarTo,
        RelationshipType::VariantOf,
        RelationshipType::PartOf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Uses => "uses",
            RelationshipType::Generates => "generates",
            RelationshipType::DependsOn => "depends_on",
            RelationshipType::Implements => "implements",
            RelationshipType::References => "references",
            RelationshipType::Extends => "extends",
            RelationshipType::ConflictsWith => "conflicts_with",
            RelationshipType::SimilarTo => "similar_to",
            RelationshipType::VariantOf => "variant_of",
            RelationshipType::PartOf => "part_of",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        RelationshipType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                KnowledgeError::invalid_input(format!("Unknown relationship type: {}", s))
            })
    }
}

/// Edge identifier: `source:target:type`
///
/// At most one edge of a given type exists between an ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(source: NodeId, target: NodeId, kind: RelationshipType) -> Self {
        Self(format!("{}:{}:{}", source, target, kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into endpoints and type
    pub fn parse(s: &str) -> Result<(NodeId, NodeId, RelationshipType)> {
        let mut parts = s.splitn(3, ':');
        let (Some(source), Some(target), Some(kind)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(KnowledgeError::invalid_input(format!("Malformed edge id: {}", s)));
        };
        Ok((source.parse()?, target.parse()?, kind.parse()?))
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for EdgeId {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        let (source, target, kind) = EdgeId::parse(s)?;
        Ok(EdgeId::new(source, target, kind))
    }
}

/// Which edges of a node to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Out,
    In,
    #[default]
    Both,
}

impl std::str::FromStr for Direction {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "out" => Ok(Direction::Out),
            "in" => Ok(Direction::In),
            "both" => Ok(Direction::Both),
            other => Err(KnowledgeError::invalid_input(format!(
                "Unknown direction: {} (expected out, in or both)",
                other
            ))),
        }
    }
}

/// A directed edge owned by the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: RelationshipType,
    /// Traversal weight in [0, 1]
    pub strength: f32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// New edge with strength 1.0
    pub fn new(source: NodeId, target: NodeId, kind: RelationshipType) -> Self {
        Self {
            id: EdgeId::new(source, target, kind),
            source,
            target,
            kind,
            strength: 1.0,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the strength, clamped to [0, 1]
    pub fn with_strength(mut self, strength: f32) -> Result<Self> {
        if !strength.is_finite() {
            return Err(KnowledgeError::invalid_input(format!(
                "edge strength must be finite, got {}",
                strength
            )));
        }
        self.strength = strength.clamp(0.0, 1.0);
        Ok(self)
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether `node` is either endpoint
    pub fn touches(&self, node: &NodeId) -> bool {
        self.source == *node || self.target == *node
    }

    /// The endpoint opposite `node`
    pub fn other_end(&self, node: &NodeId) -> NodeId {
        if self.source == *node {
            self.target
        } else {
            self.source
        }
    }
}
