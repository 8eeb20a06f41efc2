//! Project context snapshots
//!
//! Read-only view of everything a consumer (typically an AI assistant)
//! needs about one project: its nodes, their relationships, the recurring
//! patterns among them, and the canon constraints.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::edge::Relationship;
use crate::error::Result;
use crate::node::{Node, NodeId, NodeType};
use crate::patterns::{Pattern, PatternExtractor};
use crate::repository::StoreView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub project: String,
    /// Nodes scoped to the project, oldest first, embeddings omitted
    pub nodes: Vec<Node>,
    /// Edges with at least one endpoint in the project
    pub relationships: Vec<Relationship>,
    pub patterns: Vec<Pattern>,
    /// Every constraint node, scoped or not
    pub constraints: Vec<Node>,
    /// Latest node modification or edge creation
    pub last_updated: Option<DateTime<Utc>>,
}

impl ContextSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub struct ContextAssembler<'a> {
    extractor: &'a PatternExtractor,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(extractor: &'a PatternExtractor) -> Self {
        Self { extractor }
    }

    pub fn assemble(&self, view: &StoreView<'_>, project: &str) -> Result<ContextSnapshot> {
        let scoped: Vec<Node> = view
            .nodes()?
            .into_iter()
            .filter(|n| n.in_project(project))
            .collect();
        let scope: HashSet<NodeId> = scoped.iter().map(|n| n.id).collect();

        let relationships: Vec<Relationship> = view
            .graph()
            .edges()?
            .into_iter()
            .filter(|e| scope.contains(&e.source) || scope.contains(&e.target))
            .collect();

        let patterns = self.extractor.extract(&scoped, None, None);

        let constraints: Vec<Node> = view
            .graph()
            .nodes()?
            .into_iter()
            .filter(|n| n.node_type() == NodeType::Constraint)
            .collect();

        let last_updated = scoped
            .iter()
            .map(|n| n.stamp.modified_at)
            .chain(relationships.iter().map(|e| e.created_at))
            .max();

        log::debug!(
            "Assembled context for {}: {} nodes, {} edges, {} patterns",
            project,
            scoped.len(),
            relationships.len(),
            patterns.len()
        );

        Ok(ContextSnapshot {
            project: project.to_string(),
            nodes: scoped.iter().map(Node::without_embedding).collect(),
            relationships,
            patterns,
            constraints,
            last_updated,
        })
    }
}
