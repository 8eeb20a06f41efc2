//! MCP Resource Definitions
//!
//! Graph statistics plus one context snapshot per project found in the
//! store (`canongraph://project/{name}/context`).

use super::protocol::{Resource, ResourceContent, ResourceReadResult};
use crate::error::{ServerError, ServerResult};
use canongraph_store::KnowledgeGraph;
use serde::Serialize;
use std::collections::BTreeSet;

pub const STATS_URI: &str = "canongraph://graph/stats";
const PROJECT_PREFIX: &str = "canongraph://project/";
const CONTEXT_SUFFIX: &str = "/context";

/// URI of a project's context snapshot
pub fn project_context_uri(project: &str) -> String {
    format!("{}{}{}", PROJECT_PREFIX, project, CONTEXT_SUFFIX)
}

/// Get all available resources
pub fn get_all_resources(graph: &KnowledgeGraph) -> ServerResult<Vec<Resource>> {
    let mut resources = vec![Resource {
        uri: STATS_URI.to_string(),
        name: "Graph Statistics".to_string(),
        description: Some(
            "Node and edge counts by type, vector count and embedding provider".to_string(),
        ),
        mime_type: Some("application/json".to_string()),
    }];

    let projects: BTreeSet<String> = graph
        .list_nodes(None)?
        .into_iter()
        .filter_map(|node| node.project)
        .collect();

    for project in projects {
        resources.push(Resource {
            uri: project_context_uri(&project),
            name: format!("{} context", project),
            description: Some(format!(
                "Nodes, relationships, patterns and constraints of project '{}'",
                project
            )),
            mime_type: Some("application/json".to_string()),
        });
    }

    Ok(resources)
}

/// Read a resource by URI
pub fn read_resource(uri: &str, graph: &KnowledgeGraph) -> ServerResult<ResourceReadResult> {
    if uri == STATS_URI {
        return json_content(uri, &graph.stats()?);
    }

    let project = uri
        .strip_prefix(PROJECT_PREFIX)
        .and_then(|rest| rest.strip_suffix(CONTEXT_SUFFIX))
        .filter(|project| !project.is_empty())
        .ok_or_else(|| ServerError::ResourceNotFound(uri.to_string()))?;

    json_content(uri, &graph.get_project_context(project)?)
}

fn json_content<T: Serialize>(uri: &str, value: &T) -> ServerResult<ResourceReadResult> {
    Ok(ResourceReadResult {
        contents: vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: Some("application/json".to_string()),
            text: Some(serde_json::to_string_pretty(value)?),
        }],
    })
}
