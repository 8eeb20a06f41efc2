//! Knowledge node types and builders
//!
//! A node is the atomic unit of project memory. Its type is carried by the
//! [`NodeProperties`] variant, so the type and its required keys can never
//! disagree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::embedding::Modality;
use crate::error::{KnowledgeError, Result};
use crate::temporal::VersionStamp;
use crate::validation::ConstraintRule;

/// Unique identifier for knowledge nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The fixed set of node types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Asset,
    Code,
    Mechanic,
    Design,
    Lore,
    Pattern,
    Constraint,
    Decision,
}

impl NodeType {
    /// Every type, in declaration order
    pub const ALL: [NodeType; 8] = [
        NodeType::Asset,
        NodeType::Code,
        NodeType::Mechanic,
        NodeType::Design,
        NodeType::Lore,
        NodeType::Pattern,
        NodeType::Constraint,
        NodeType::Decision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Asset => "asset",
            NodeType::Code => "code",
            NodeType::Mechanic => "mechanic",
            NodeType::Design => "design",
            NodeType::Lore => "lore",
            NodeType::Pattern => "pattern",
            NodeType::Constraint => "constraint",
            NodeType::Decision => "decision",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| KnowledgeError::invalid_input(format!("Unknown node type: {}", s)))
    }
}

/// Pixel dimensions of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Generated or imported asset (sprite, texture, model, sound)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetProperties {
    pub path: String,
    pub format: String,
    pub dimensions: Dimensions,
    /// Embed the image at `path` instead of the textual description
    ///
    /// The vector then depends on `path` alone: renaming the node or
    /// editing its description keeps the old vector, and text-only search
    /// reaches the asset only through how the image itself embeds.
    #[serde(default)]
    pub embed_from_image: bool,
}

/// Reusable code fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeProperties {
    pub language: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Gameplay mechanic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicProperties {
    pub category: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// Design choice (visual, UX, level, audio)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignProperties {
    pub area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// World-building fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoreProperties {
    pub setting: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<String>,
}

/// Persisted output of the pattern extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternProperties {
    pub frequency: usize,
    pub members: Vec<NodeId>,
    pub similarity: f32,
}

/// Canon rule other nodes are checked against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintProperties {
    pub rule: ConstraintRule,
    /// Enforced constraints block commits; others only warn
    pub enforced: bool,
    /// Applies to every node, not only linked ones
    #[serde(default)]
    pub global: bool,
    /// Restrict to these node types (empty = all)
    #[serde(default)]
    pub applies_to: Vec<NodeType>,
}

impl ConstraintProperties {
    /// Whether this constraint should be evaluated for a node of `node_type`
    pub fn applies_to_type(&self, node_type: NodeType) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&node_type)
    }
}

/// Recorded project decision with rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionProperties {
    pub decision: String,
    pub rationale: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Typed properties, one variant per node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeProperties {
    Asset(AssetProperties),
    Code(CodeProperties),
    Mechanic(MechanicProperties),
    Design(DesignProperties),
    Lore(LoreProperties),
    Pattern(PatternProperties),
    Constraint(ConstraintProperties),
    Decision(DecisionProperties),
}

impl NodeProperties {
    /// The node type these properties belong to
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeProperties::Asset(_) => NodeType::Asset,
            NodeProperties::Code(_) => NodeType::Code,
            NodeProperties::Mechanic(_) => NodeType::Mechanic,
            NodeProperties::Design(_) => NodeType::Design,
            NodeProperties::Lore(_) => NodeType::Lore,
            NodeProperties::Pattern(_) => NodeType::Pattern,
            NodeProperties::Constraint(_) => NodeType::Constraint,
            NodeProperties::Decision(_) => NodeType::Decision,
        }
    }

    /// Constraint payload, if this is a constraint
    pub fn as_constraint(&self) -> Option<&ConstraintProperties> {
        match self {
            NodeProperties::Constraint(c) => Some(c),
            _ => None,
        }
    }

    /// Check the required keys carry usable values
    pub fn validate(&self) -> Result<()> {
        fn required(field: &str, value: &str) -> Result<()> {
            if value.trim().is_empty() {
                Err(KnowledgeError::invalid_node(format!(
                    "required property '{}' is empty",
                    field
                )))
            } else {
                Ok(())
            }
        }

        match self {
            NodeProperties::Asset(a) => {
                required("path", &a.path)?;
                required("format", &a.format)?;
                if a.dimensions.width == 0 || a.dimensions.height == 0 {
                    return Err(KnowledgeError::invalid_node(
                        "asset dimensions must be non-zero",
                    ));
                }
            }
            NodeProperties::Code(c) => {
                required("language", &c.language)?;
                required("snippet", &c.snippet)?;
            }
            NodeProperties::Mechanic(m) => required("category", &m.category)?,
            NodeProperties::Design(d) => required("area", &d.area)?,
            NodeProperties::Lore(l) => required("setting", &l.setting)?,
            NodeProperties::Pattern(p) => {
                if p.members.len() < 2 || p.frequency != p.members.len() {
                    return Err(KnowledgeError::invalid_node(
                        "pattern needs at least two members and frequency equal to member count",
                    ));
                }
                if !p.similarity.is_finite() {
                    return Err(KnowledgeError::invalid_node("pattern similarity is not finite"));
                }
            }
            NodeProperties::Constraint(c) => c.rule.validate()?,
            NodeProperties::Decision(d) => {
                required("decision", &d.decision)?;
                required("rationale", &d.rationale)?;
            }
        }
        Ok(())
    }

    /// Canonical text rendering used for embeddings (field order is fixed)
    pub fn describe(&self) -> String {
        match self {
            NodeProperties::Asset(a) => format!(
                "asset path={} format={} dimensions={}x{}",
                a.path, a.format, a.dimensions.width, a.dimensions.height
            ),
            NodeProperties::Code(c) => {
                format!("code language={}\n{}", c.language, c.snippet)
            }
            NodeProperties::Mechanic(m) => {
                format!("mechanic category={} rules={}", m.category, m.rules.join("; "))
            }
            NodeProperties::Design(d) => format!(
                "design area={} rationale={}",
                d.area,
                d.rationale.as_deref().unwrap_or("")
            ),
            NodeProperties::Lore(l) => format!(
                "lore setting={} era={}",
                l.setting,
                l.era.as_deref().unwrap_or("")
            ),
            NodeProperties::Pattern(p) => format!(
                "pattern frequency={} similarity={:.3}",
                p.frequency, p.similarity
            ),
            NodeProperties::Constraint(c) => format!(
                "constraint enforced={} rule={}",
                c.enforced,
                c.rule.describe()
            ),
            NodeProperties::Decision(d) => format!(
                "decision {} rationale={} alternatives={}",
                d.decision,
                d.rationale,
                d.alternatives.join("; ")
            ),
        }
    }

    /// Properties as a flat JSON object (without the `type` tag)
    pub fn to_map(&self) -> serde_json::Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                map
            }
            _ => serde_json::Map::new(),
        }
    }
}

/// What to feed the embedding provider for a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingInput {
    pub modality: Modality,
    pub content: String,
}

fn embedding_input_for(name: &str, description: &str, properties: &NodeProperties) -> EmbeddingInput {
    match properties {
        NodeProperties::Asset(a) if a.embed_from_image => EmbeddingInput {
            modality: Modality::Image,
            content: a.path.clone(),
        },
        NodeProperties::Code(_) => EmbeddingInput {
            modality: Modality::Code,
            content: format!("{}\n{}\n{}", name, description, properties.describe()),
        },
        _ => EmbeddingInput {
            modality: Modality::Text,
            content: format!("{}\n{}\n{}", name, description, properties.describe()),
        },
    }
}

/// A knowledge node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier, immutable
    pub id: NodeId,
    /// Short name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Free-form tags (duplicates allowed)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Owning project, if scoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Typed properties (determines the node type)
    pub properties: NodeProperties,
    /// Extra free-form properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    /// Current embedding vector
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Timestamps and version
    pub stamp: VersionStamp,
}

impl Node {
    /// Create a new builder
    pub fn builder() -> NewNodeBuilder {
        NewNodeBuilder::new()
    }

    pub fn node_type(&self) -> NodeType {
        self.properties.node_type()
    }

    pub fn version(&self) -> u64 {
        self.stamp.version
    }

    /// Input the embedding is derived from
    pub fn embedding_input(&self) -> EmbeddingInput {
        embedding_input_for(&self.name, &self.description, &self.properties)
    }

    /// Whether the node is scoped to `project`
    pub fn in_project(&self, project: &str) -> bool {
        if self.project.as_deref() == Some(project) {
            return true;
        }
        let tag = format!("project:{}", project);
        self.tags.iter().any(|t| *t == tag)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Typed properties merged with `extra` (typed keys win)
    pub fn property_map(&self) -> serde_json::Map<String, Value> {
        let mut map: serde_json::Map<String, Value> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        map.extend(self.properties.to_map());
        map
    }

    /// Text searched by constraint term rules
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.name,
            self.description,
            self.tags.join(" "),
            self.properties.describe()
        )
    }

    /// Copy without the embedding vector (for snapshots and tool output)
    pub fn without_embedding(&self) -> Node {
        Node {
            embedding: Vec::new(),
            ..self.clone()
        }
    }
}

/// Caller-supplied content for a node that does not exist yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project: Option<String>,
    pub properties: NodeProperties,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl NewNode {
    pub fn node_type(&self) -> NodeType {
        self.properties.node_type()
    }

    /// Run the per-type checks
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(KnowledgeError::invalid_node("name is empty"));
        }
        self.properties.validate()
    }

    pub fn embedding_input(&self) -> EmbeddingInput {
        embedding_input_for(&self.name, &self.description, &self.properties)
    }

    /// Materialize the node with a fresh id and version 1
    pub fn into_node(self, embedding: Vec<f32>) -> Node {
        Node {
            id: NodeId::new(),
            name: self.name,
            description: self.description,
            tags: self.tags,
            project: self.project,
            properties: self.properties,
            extra: self.extra,
            embedding,
            stamp: VersionStamp::new_current(),
        }
    }
}

/// Builder for [`NewNode`] with fluent API
#[derive(Debug, Default)]
pub struct NewNodeBuilder {
    name: Option<String>,
    description: String,
    tags: Vec<String>,
    project: Option<String>,
    properties: Option<NodeProperties>,
    extra: BTreeMap<String, Value>,
}

impl NewNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Set the properties directly
    pub fn properties(mut self, properties: NodeProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Set as asset
    pub fn asset(
        self,
        path: impl Into<String>,
        format: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        self.properties(NodeProperties::Asset(AssetProperties {
            path: path.into(),
            format: format.into(),
            dimensions: Dimensions { width, height },
            embed_from_image: false,
        }))
    }

    /// Set as code
    pub fn code(self, language: impl Into<String>, snippet: impl Into<String>) -> Self {
        self.properties(NodeProperties::Code(CodeProperties {
            language: language.into(),
            snippet: snippet.into(),
            path: None,
        }))
    }

    /// Set as mechanic
    pub fn mechanic(self, category: impl Into<String>) -> Self {
        self.properties(NodeProperties::Mechanic(MechanicProperties {
            category: category.into(),
            rules: vec![],
        }))
    }

    /// Set as design
    pub fn design(self, area: impl Into<String>) -> Self {
        self.properties(NodeProperties::Design(DesignProperties {
            area: area.into(),
            rationale: None,
        }))
    }

    /// Set as lore
    pub fn lore(self, setting: impl Into<String>) -> Self {
        self.properties(NodeProperties::Lore(LoreProperties {
            setting: setting.into(),
            era: None,
        }))
    }

    /// Set as constraint
    pub fn constraint(self, rule: ConstraintRule, enforced: bool) -> Self {
        self.properties(NodeProperties::Constraint(ConstraintProperties {
            rule,
            enforced,
            global: false,
            applies_to: vec![],
        }))
    }

    /// Set as a constraint checked against every node
    pub fn global_constraint(self, rule: ConstraintRule, enforced: bool) -> Self {
        self.properties(NodeProperties::Constraint(ConstraintProperties {
            rule,
            enforced,
            global: true,
            applies_to: vec![],
        }))
    }

    /// Set as decision
    pub fn decision(self, decision: impl Into<String>, rationale: impl Into<String>) -> Self {
        self.properties(NodeProperties::Decision(DecisionProperties {
            decision: decision.into(),
            rationale: rationale.into(),
            alternatives: vec![],
        }))
    }

    /// Build the NewNode
    pub fn build(self) -> std::result::Result<NewNode, NodeBuilderError> {
        let name = self.name.ok_or(NodeBuilderError::MissingName)?;
        let properties = self.properties.ok_or(NodeBuilderError::MissingProperties)?;

        Ok(NewNode {
            name,
            description: self.description,
            tags: self.tags,
            project: self.project,
            properties,
            extra: self.extra,
        })
    }
}

/// Errors that can occur when building a NewNode
#[derive(Debug, thiserror::Error)]
pub enum NodeBuilderError {
    #[error("Missing required field: name")]
    MissingName,
    #[error("Missing required field: properties")]
    MissingProperties,
}

impl From<NodeBuilderError> for KnowledgeError {
    fn from(err: NodeBuilderError) -> Self {
        KnowledgeError::invalid_node(err.to_string())
    }
}

/// Partial update of a node; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub properties: Option<NodeProperties>,
    /// Merged into `extra`; a `null` value removes the key
    #[serde(default)]
    pub extra: Option<BTreeMap<String, Value>>,
}

impl NodePatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn properties(mut self, properties: NodeProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Apply to a copy of `node`; the result still needs a version bump
    ///
    /// Changing the node type is rejected: relationships and constraints
    /// already attached to the node were chosen for its type.
    pub fn apply_to(&self, node: &Node) -> Result<Node> {
        let mut updated = node.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(tags) = &self.tags {
            updated.tags = tags.clone();
        }
        if let Some(project) = &self.project {
            updated.project = Some(project.clone());
        }
        if let Some(properties) = &self.properties {
            if properties.node_type() != node.node_type() {
                return Err(KnowledgeError::invalid_input(format!(
                    "node type is immutable ({} -> {})",
                    node.node_type(),
                    properties.node_type()
                )));
            }
            updated.properties = properties.clone();
        }
        if let Some(extra) = &self.extra {
            for (key, value) in extra {
                if value.is_null() {
                    updated.extra.remove(key);
                } else {
                    updated.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if updated.name.trim().is_empty() {
            return Err(KnowledgeError::invalid_node("name is empty"));
        }
        updated.properties.validate()?;
        Ok(updated)
    }
}
