//! MCP Tool Definitions
//!
//! One tool per knowledge graph operation, grouped as node, relationship,
//! search, canon, pattern and maintenance tools.

use super::protocol::{PropertySchema, Tool, ToolInputSchema};
use canongraph_store::{Direction, NodeType, RelationshipType};
use serde_json::json;
use std::collections::BTreeMap;

/// Get all available knowledge graph tools
pub fn get_all_tools() -> Vec<Tool> {
    vec![
        // Node Tools (4)
        create_node_tool(),
        update_node_tool(),
        delete_node_tool(),
        get_node_tool(),
        // Relationship Tools (4)
        create_relationship_tool(),
        get_relationships_tool(),
        remove_relationship_tool(),
        traverse_tool(),
        // Search Tools (3)
        search_tool(),
        list_nodes_tool(),
        find_by_tag_tool(),
        // Canon Tools (2)
        validate_canon_tool(),
        validate_node_tool(),
        // Pattern & Context Tools (3)
        extract_patterns_tool(),
        persist_pattern_tool(),
        get_project_context_tool(),
        // Maintenance Tools (3)
        update_graph_tool(),
        stats_tool(),
        check_consistency_tool(),
    ]
}

fn tool(name: &str, description: &str, properties: Vec<(&str, PropertySchema)>, required: &[&str]) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: ToolInputSchema {
            schema_type: "object".to_string(),
            properties: properties
                .into_iter()
                .map(|(key, schema)| (key.to_string(), schema))
                .collect::<BTreeMap<_, _>>(),
            required: required.iter().map(|r| r.to_string()).collect(),
        },
    }
}

fn node_id_prop(description: &str) -> PropertySchema {
    PropertySchema::string(description)
}

fn node_type_prop(description: &str) -> PropertySchema {
    PropertySchema::string(description).with_enum(NodeType::ALL.iter().map(|t| t.as_str()))
}

fn relationship_type_prop(description: &str) -> PropertySchema {
    PropertySchema::string(description)
        .with_enum(RelationshipType::ALL.iter().map(|t| t.as_str()))
}

fn properties_prop() -> PropertySchema {
    PropertySchema::object(
        "Typed properties tagged by \"type\". asset: path, format, dimensions{width,height}, \
         embed_from_image?; code: language, snippet, path?; mechanic: category, rules?; \
         design: area, rationale?; lore: setting, era?; constraint: rule{kind,..}, enforced, \
         global?, applies_to?; decision: decision, rationale, alternatives?",
    )
}

fn draft_props() -> Vec<(&'static str, PropertySchema)> {
    vec![
        ("name", PropertySchema::string("Short node name")),
        ("description", PropertySchema::string("Free-form description")),
        (
            "tags",
            PropertySchema::array("Free-form tags", PropertySchema::string("")),
        ),
        ("project", PropertySchema::string("Owning project")),
        ("properties", properties_prop()),
        ("extra", PropertySchema::object("Extra free-form properties")),
    ]
}

// === Node Tools ===

fn create_node_tool() -> Tool {
    tool(
        "kg_create_node",
        "Creates a knowledge node and embeds it. The node is stored in both the graph and the vector index or not at all. Fails if an enforced global constraint blocks it. USE WHEN: recording an asset, mechanic, design choice, lore fact, constraint or decision.",
        draft_props(),
        &["name", "properties"],
    )
}

fn update_node_tool() -> Tool {
    tool(
        "kg_update_node",
        "Applies a partial update to a node. Bumps its version by one and re-embeds only if the embedded content changed. USE WHEN: refining an existing node.",
        vec![
            ("id", node_id_prop("Node ID")),
            (
                "patch",
                PropertySchema::object(
                    "Fields to change: name, description, tags, project, properties, extra (null removes a key)",
                ),
            ),
        ],
        &["id", "patch"],
    )
}

fn delete_node_tool() -> Tool {
    tool(
        "kg_delete_node",
        "Deletes a node from both stores and removes every edge touching it. Returns the removed edges.",
        vec![("id", node_id_prop("Node ID"))],
        &["id"],
    )
}

fn get_node_tool() -> Tool {
    tool(
        "kg_get_node",
        "Gets a node by ID.",
        vec![
            ("id", node_id_prop("Node ID")),
            (
                "include_embedding",
                PropertySchema::boolean("Include the embedding vector").with_default(json!(false)),
            ),
        ],
        &["id"],
    )
}

// === Relationship Tools ===

fn create_relationship_tool() -> Tool {
    tool(
        "kg_create_relationship",
        "Links two existing nodes with a typed, directed edge. Replaces an existing edge of the same type between the same pair.",
        vec![
            ("source", node_id_prop("Source node ID")),
            ("target", node_id_prop("Target node ID")),
            ("kind", relationship_type_prop("Relationship type")),
            (
                "strength",
                PropertySchema::number("Edge weight, clamped to 0-1")
                    .with_default(json!(1.0))
                    .with_range(0.0, 1.0),
            ),
        ],
        &["source", "target", "kind"],
    )
}

fn get_relationships_tool() -> Tool {
    tool(
        "kg_get_relationships",
        "Lists the edges of a node.",
        vec![
            ("id", node_id_prop("Node ID")),
            (
                "direction",
                PropertySchema::string("Which edges to return")
                    .with_enum(["out", "in", "both"])
                    .with_default(json!(direction_name(Direction::default()))),
            ),
        ],
        &["id"],
    )
}

fn remove_relationship_tool() -> Tool {
    tool(
        "kg_remove_relationship",
        "Removes an edge by ID (source:target:kind).",
        vec![("edge", PropertySchema::string("Edge ID"))],
        &["edge"],
    )
}

fn traverse_tool() -> Tool {
    tool(
        "kg_traverse",
        "Breadth-first walk over outgoing edges from a node. USE WHEN: following dependencies or generation chains.",
        vec![
            ("id", node_id_prop("Start node ID")),
            (
                "max_depth",
                PropertySchema::integer("Hops to follow")
                    .with_default(json!(2))
                    .with_range(1.0, 10.0),
            ),
            (
                "kinds",
                PropertySchema::array(
                    "Only follow these relationship types (default: all)",
                    relationship_type_prop(""),
                ),
            ),
        ],
        &["id"],
    )
}

// === Search Tools ===

fn search_tool() -> Tool {
    tool(
        "kg_search",
        "Semantic search over the knowledge graph. Ranks by embedding similarity and adds one hop of similar_to/references neighbours with a discounted score. USE WHEN: looking for prior work related to a description.",
        vec![
            ("text", PropertySchema::string("Query text")),
            (
                "embedding",
                PropertySchema::array(
                    "Precomputed query vector (wins over text)",
                    PropertySchema::number(""),
                ),
            ),
            (
                "node_types",
                PropertySchema::array("Only return these node types", node_type_prop("")),
            ),
            ("limit", PropertySchema::integer("Maximum results (default: 10)")),
            (
                "threshold",
                PropertySchema::number("Minimum similarity for primary hits")
                    .with_range(-1.0, 1.0),
            ),
            (
                "expand_graph",
                PropertySchema::boolean("Follow similar_to/references edges from hits"),
            ),
        ],
        &[],
    )
}

fn list_nodes_tool() -> Tool {
    tool(
        "kg_list_nodes",
        "Lists nodes, oldest first, optionally of one type.",
        vec![("node_type", node_type_prop("Only list this node type"))],
        &[],
    )
}

fn find_by_tag_tool() -> Tool {
    tool(
        "kg_find_by_tag",
        "Lists nodes carrying a tag.",
        vec![("tag", PropertySchema::string("Tag to match exactly"))],
        &["tag"],
    )
}

// === Canon Tools ===

fn validate_canon_tool() -> Tool {
    tool(
        "kg_validate_canon",
        "Checks a node against constraints and the project canon: constraint rules, style drift from style-baseline nodes, conflicts_with edges and near-duplicates. Pass either the ID of a stored node or a draft node that has not been created. USE WHEN: before committing new content, or to review existing content.",
        vec![
            ("id", node_id_prop("Stored node ID")),
            (
                "node",
                PropertySchema::object(
                    "Draft node (name, description, tags, project, properties, extra)",
                ),
            ),
            (
                "constraint_ids",
                PropertySchema::array(
                    "Constraint nodes to check against (default: linked and global constraints)",
                    node_id_prop(""),
                ),
            ),
        ],
        &[],
    )
}

fn validate_node_tool() -> Tool {
    tool(
        "kg_validate_node",
        "Validates a stored node against its linked and global constraints.",
        vec![("id", node_id_prop("Node ID"))],
        &["id"],
    )
}

// === Pattern & Context Tools ===

fn extract_patterns_tool() -> Tool {
    tool(
        "kg_extract_patterns",
        "Clusters nodes of the same type by embedding similarity and reports recurring patterns. Deterministic for a given graph. USE WHEN: looking for repeated motifs worth turning into a shared template or rule.",
        vec![
            ("node_type", node_type_prop("Only cluster this type (default: every type except pattern)")),
            (
                "min_frequency",
                PropertySchema::integer("Smallest cluster to report (never below 2)")
                    .with_default(json!(2)),
            ),
            (
                "min_similarity",
                PropertySchema::number("Similarity to the seed a member must exceed")
                    .with_range(-1.0, 1.0),
            ),
        ],
        &[],
    )
}

fn persist_pattern_tool() -> Tool {
    tool(
        "kg_persist_pattern",
        "Stores a pattern returned by kg_extract_patterns as a pattern node, with part_of edges from each member.",
        vec![(
            "pattern",
            PropertySchema::object("Pattern object as returned by kg_extract_patterns"),
        )],
        &["pattern"],
    )
}

fn get_project_context_tool() -> Tool {
    tool(
        "kg_get_project_context",
        "Snapshot of a project: its nodes, the edges touching them, patterns among them, every constraint and the last update time. USE WHEN: starting work on a project and needing its canon.",
        vec![("project", PropertySchema::string("Project name"))],
        &["project"],
    )
}

// === Maintenance Tools ===

fn update_graph_tool() -> Tool {
    tool(
        "kg_update_graph",
        "Applies a batch of operations in order. Stops at the first failure; earlier operations stay committed. Operations are tagged by \"op\": create{node}, update{id,patch}, delete{id}, relate{source,target,kind,strength?}, unrelate{edge}.",
        vec![(
            "operations",
            PropertySchema::array("Operations to apply", PropertySchema::object("")),
        )],
        &["operations"],
    )
}

fn stats_tool() -> Tool {
    tool(
        "kg_stats",
        "Node and edge counts by type, vector count, dimension and embedding provider.",
        vec![],
        &[],
    )
}

fn check_consistency_tool() -> Tool {
    tool(
        "kg_check_consistency",
        "Compares the graph store with the vector index and repairs interrupted writes: removes vectors without a node and nodes without a vector (with their edges).",
        vec![],
        &[],
    )
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Out => "out",
        Direction::In => "in",
        Direction::Both => "both",
    }
}
