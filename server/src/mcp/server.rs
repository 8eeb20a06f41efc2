//! MCP Server Implementation
//!
//! Handles MCP protocol requests and routes tool calls to the knowledge
//! graph. Tool failures come back as `isError` results so the model sees
//! them; only malformed protocol traffic produces JSON-RPC errors.

use super::protocol::*;
use super::resources::{get_all_resources, read_resource};
use super::tools::get_all_tools;
use super::transport::{Incoming, Transport};
use crate::error::{ServerError, ServerResult};
use canongraph_store::{
    Direction, EdgeId, GraphOperation, KnowledgeGraph, NewNode, Node, NodeId, NodePatch,
    NodeType, Pattern, RelationshipType, SemanticQuery,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "canongraph";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_TRAVERSE_DEPTH: usize = 2;

#[derive(Deserialize)]
struct IdArgs {
    id: NodeId,
}

#[derive(Deserialize)]
struct GetNodeArgs {
    id: NodeId,
    #[serde(default)]
    include_embedding: bool,
}

#[derive(Deserialize)]
struct UpdateNodeArgs {
    id: NodeId,
    patch: NodePatch,
}

#[derive(Deserialize)]
struct CreateRelationshipArgs {
    source: NodeId,
    target: NodeId,
    kind: RelationshipType,
    #[serde(default)]
    strength: Option<f32>,
}

#[derive(Deserialize)]
struct GetRelationshipsArgs {
    id: NodeId,
    #[serde(default)]
    direction: Direction,
}

#[derive(Deserialize)]
struct EdgeArgs {
    edge: EdgeId,
}

#[derive(Deserialize)]
struct TraverseArgs {
    id: NodeId,
    #[serde(default)]
    max_depth: Option<usize>,
    #[serde(default)]
    kinds: Option<Vec<RelationshipType>>,
}

#[derive(Deserialize)]
struct NodeTypeArgs {
    #[serde(default)]
    node_type: Option<NodeType>,
}

#[derive(Deserialize)]
struct TagArgs {
    tag: String,
}

#[derive(Deserialize)]
struct ValidateCanonArgs {
    #[serde(default)]
    id: Option<NodeId>,
    #[serde(default)]
    node: Option<NewNode>,
    #[serde(default)]
    constraint_ids: Option<Vec<NodeId>>,
}

#[derive(Deserialize)]
struct ExtractPatternsArgs {
    #[serde(default)]
    node_type: Option<NodeType>,
    #[serde(default)]
    min_frequency: Option<usize>,
    #[serde(default)]
    min_similarity: Option<f32>,
}

#[derive(Deserialize)]
struct PersistPatternArgs {
    pattern: Pattern,
}

#[derive(Deserialize)]
struct ProjectArgs {
    project: String,
}

#[derive(Deserialize)]
struct UpdateGraphArgs {
    operations: Vec<GraphOperation>,
}

/// Decode tool arguments into their typed form
fn parse_args<T: DeserializeOwned>(args: Value) -> ServerResult<T> {
    serde_json::from_value(args).map_err(|e| ServerError::invalid_params(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> ServerResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn strip_embeddings(nodes: Vec<Node>) -> Vec<Node> {
    nodes.iter().map(Node::without_embedding).collect()
}

/// MCP Server - handles protocol messages
pub struct McpServer {
    graph: Arc<KnowledgeGraph>,
    initialized: bool,
}

impl McpServer {
    pub fn new(graph: Arc<KnowledgeGraph>) -> Self {
        Self {
            graph,
            initialized: false,
        }
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Whether the client has sent `notifications/initialized`
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Serve stdin/stdout until the client disconnects
    pub async fn run(&mut self) -> ServerResult<()> {
        self.serve(Transport::stdio()).await
    }

    /// Serve any line-framed transport until it closes, then flush the stores
    pub async fn serve<R, W>(&mut self, mut transport: Transport<R, W>) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server starting...");

        loop {
            match transport.read().await? {
                Incoming::Request(request) => {
                    if let Some(response) = self.handle_request(request).await {
                        transport.write(&response).await?;
                    }
                }
                Incoming::Malformed(reason) => {
                    let response = JsonRpcResponse::error(
                        None,
                        JsonRpcError::parse_error(format!("Parse error: {}", reason)),
                    );
                    transport.write(&response).await?;
                }
                Incoming::Closed => {
                    tracing::info!("Client disconnected");
                    break;
                }
            }
        }

        self.graph.flush()?;
        Ok(())
    }

    /// Handle a JSON-RPC message; notifications get no response
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Handling request: {}", request.method);

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version: {}",
                    request.jsonrpc
                )),
            ));
        }

        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" | "initialized" => self.initialized = true,
                "notifications/cancelled" => {}
                other => tracing::debug!("Ignoring notification: {}", other),
            }
            return None;
        }

        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => JsonRpcResponse::from_result(id, &PingResult {}),
            "tools/list" => JsonRpcResponse::from_result(
                id,
                &ToolsListResult {
                    tools: get_all_tools(),
                },
            ),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => self.handle_resources_list(id),
            "resources/read" => self.handle_resources_read(id, request.params),
            method => JsonRpcResponse::error(id, JsonRpcError::method_not_found(method)),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();
        if let Some(client) = &params.client_info {
            tracing::info!(
                "Client connected: {} {}",
                client.name,
                client.version.as_deref().unwrap_or("")
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                logging: Some(LoggingCapability {}),
                resources: Some(ResourcesCapability {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(SERVER_VERSION.to_string()),
            },
            instructions: Some(
                "Project knowledge graph. Search before creating, validate drafts with \
                 kg_validate_canon, and read a project's context resource to learn its canon."
                    .to_string(),
            ),
        };

        JsonRpcResponse::from_result(id, &result)
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params.map(serde_json::from_value) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                );
            }
            None => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"));
            }
        };

        match self.execute_tool(&params.name, params.arguments).await {
            Ok(result) => JsonRpcResponse::from_result(id, &ToolCallResult::json(&result)),
            Err(ServerError::UnknownTool(name)) => JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Unknown tool: {}", name)),
            ),
            Err(e) => {
                if e.is_client_error() {
                    tracing::debug!("Tool {} rejected: {}", params.name, e);
                } else {
                    tracing::warn!("Tool {} failed: {}", params.name, e);
                }
                JsonRpcResponse::from_result(id, &ToolCallResult::failure(&e))
            }
        }
    }

    fn handle_resources_list(&self, id: Option<Value>) -> JsonRpcResponse {
        match get_all_resources(&self.graph) {
            Ok(resources) => JsonRpcResponse::from_result(id, &ResourcesListResult { resources }),
            Err(e) => JsonRpcResponse::error(id, e.into()),
        }
    }

    fn handle_resources_read(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ResourceReadParams = match params.map(serde_json::from_value) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                );
            }
            None => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"));
            }
        };

        match read_resource(&params.uri, &self.graph) {
            Ok(result) => JsonRpcResponse::from_result(id, &result),
            Err(e) => JsonRpcResponse::error(id, e.into()),
        }
    }

    /// Execute a tool by name
    pub async fn execute_tool(&self, name: &str, args: Option<Value>) -> ServerResult<Value> {
        let args = args.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let graph = &self.graph;

        match name {
            // Node tools
            "kg_create_node" => {
                let node: NewNode = parse_args(args)?;
                let node = graph.create_node(node).await?;
                tracing::info!("Created {} node {}", node.node_type(), node.id);
                to_json(&node.without_embedding())
            }

            "kg_update_node" => {
                let args: UpdateNodeArgs = parse_args(args)?;
                let node = graph.update_node(&args.id, args.patch).await?;
                to_json(&node.without_embedding())
            }

            "kg_delete_node" => {
                let args: IdArgs = parse_args(args)?;
                let removed = graph.delete_node(&args.id).await?;
                Ok(json!({
                    "deleted": args.id,
                    "relationshipsRemoved": removed,
                }))
            }

            "kg_get_node" => {
                let args: GetNodeArgs = parse_args(args)?;
                let node = graph.get_node(&args.id)?;
                if args.include_embedding {
                    to_json(&node)
                } else {
                    to_json(&node.without_embedding())
                }
            }

            // Relationship tools
            "kg_create_relationship" => {
                let args: CreateRelationshipArgs = parse_args(args)?;
                let edge = graph
                    .create_relationship(args.source, args.target, args.kind, args.strength)
                    .await?;
                to_json(&edge)
            }

            "kg_get_relationships" => {
                let args: GetRelationshipsArgs = parse_args(args)?;
                let edges = graph.get_relationships(&args.id, args.direction)?;
                Ok(json!({
                    "relationships": edges,
                    "total": edges.len(),
                }))
            }

            "kg_remove_relationship" => {
                let args: EdgeArgs = parse_args(args)?;
                to_json(&graph.remove_relationship(&args.edge).await?)
            }

            "kg_traverse" => {
                let args: TraverseArgs = parse_args(args)?;
                let nodes = graph.traverse(
                    &args.id,
                    args.max_depth.unwrap_or(DEFAULT_TRAVERSE_DEPTH),
                    args.kinds.as_deref(),
                )?;
                Ok(json!({
                    "nodes": nodes,
                    "total": nodes.len(),
                }))
            }

            // Search tools
            "kg_search" => {
                let query: SemanticQuery = parse_args(args)?;
                let results = graph.search(&query).await?;
                Ok(json!({
                    "results": results,
                    "total": results.len(),
                }))
            }

            "kg_list_nodes" => {
                let args: NodeTypeArgs = parse_args(args)?;
                let nodes = strip_embeddings(graph.list_nodes(args.node_type)?);
                Ok(json!({
                    "nodes": nodes,
                    "total": nodes.len(),
                }))
            }

            "kg_find_by_tag" => {
                let args: TagArgs = parse_args(args)?;
                let nodes = strip_embeddings(graph.find_by_tag(&args.tag)?);
                Ok(json!({
                    "nodes": nodes,
                    "total": nodes.len(),
                }))
            }

            // Canon tools
            "kg_validate_canon" => {
                let args: ValidateCanonArgs = parse_args(args)?;
                to_json(&self.validate_canon(args).await?)
            }

            "kg_validate_node" => {
                let args: IdArgs = parse_args(args)?;
                to_json(&graph.validate_node(&args.id)?)
            }

            // Pattern & context tools
            "kg_extract_patterns" => {
                let args: ExtractPatternsArgs = parse_args(args)?;
                let patterns = match args.min_similarity {
                    Some(min_similarity) => graph.extract_patterns_with(
                        args.node_type,
                        min_similarity,
                        args.min_frequency
                            .unwrap_or(graph.config().patterns.min_frequency),
                    )?,
                    None => graph.extract_patterns(args.node_type, args.min_frequency)?,
                };
                Ok(json!({
                    "patterns": patterns,
                    "total": patterns.len(),
                }))
            }

            "kg_persist_pattern" => {
                let args: PersistPatternArgs = parse_args(args)?;
                let node = graph.persist_pattern(&args.pattern).await?;
                to_json(&node.without_embedding())
            }

            "kg_get_project_context" => {
                let args: ProjectArgs = parse_args(args)?;
                to_json(&graph.get_project_context(&args.project)?)
            }

            // Maintenance tools
            "kg_update_graph" => {
                let args: UpdateGraphArgs = parse_args(args)?;
                to_json(&graph.update_graph(args.operations).await)
            }

            "kg_stats" => to_json(&graph.stats()?),

            "kg_check_consistency" => to_json(&graph.check_consistency().await?),

            _ => Err(ServerError::UnknownTool(name.to_string())),
        }
    }

    async fn validate_canon(
        &self,
        args: ValidateCanonArgs,
    ) -> ServerResult<canongraph_store::ValidationReport> {
        let graph = &self.graph;

        let constraints = match &args.constraint_ids {
            Some(ids) => Some(
                ids.iter()
                    .map(|id| graph.get_node(id))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        match (args.id, args.node, constraints) {
            (Some(_), Some(_), _) => Err(ServerError::invalid_params(
                "Pass either 'id' or 'node', not both",
            )),
            (Some(id), None, None) => Ok(graph.validate_node(&id)?),
            (Some(id), None, Some(constraints)) => {
                let node = graph.get_node(&id)?;
                Ok(graph.validate_canon(&node, &constraints).await?)
            }
            (None, Some(draft), None) => Ok(graph.validate_draft(draft).await?),
            (None, Some(draft), Some(constraints)) => {
                draft.validate()?;
                let candidate = draft.into_node(Vec::new());
                Ok(graph.validate_canon(&candidate, &constraints).await?)
            }
            (None, None, _) => Err(ServerError::invalid_params(
                "Missing 'id' or 'node' to validate",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canongraph_store::{HashingEmbedder, KnowledgeConfig};

    fn server() -> McpServer {
        let graph = KnowledgeGraph::in_memory(
            Arc::new(HashingEmbedder::new(64).unwrap()),
            KnowledgeConfig::default(),
        );
        McpServer::new(Arc::new(graph))
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    async fn call(server: &mut McpServer, name: &str, arguments: Value) -> Value {
        let response = server
            .handle_request(request(
                1,
                "tools/call",
                json!({"name": name, "arguments": arguments}),
            ))
            .await
            .unwrap();
        serde_json::to_value(response.result.unwrap()).unwrap()
    }

    fn payload(result: &Value) -> Value {
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    fn mechanic(name: &str, project: &str) -> Value {
        json!({
            "name": name,
            "description": "timed button presses during attacks",
            "project": project,
            "properties": {"type": "mechanic", "category": "combat"}
        })
    }

    #[tokio::test]
    async fn test_initialize() {
        let mut server = server();
        let response = server
            .handle_request(request(1, "initialize", json!({"protocolVersion": "2024-11-05"})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let mut server = server();
        let notification = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(server.handle_request(notification).await.is_none());
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut server = server();
        let response = server
            .handle_request(request(3, "prompts/list", json!({})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error() {
        let mut server = server();
        let response = server
            .handle_request(request(
                4,
                "tools/call",
                json!({"name": "kg_nope", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_create_then_get_node() {
        let mut server = server();
        let created = call(&mut server, "kg_create_node", mechanic("Parry", "duel")).await;
        assert!(created.get("isError").is_none());
        let node = payload(&created);
        assert_eq!(node["name"], "Parry");
        assert!(node.get("embedding").is_none());
        assert_eq!(node["stamp"]["version"], 1);

        let fetched = call(
            &mut server,
            "kg_get_node",
            json!({"id": node["id"], "include_embedding": true}),
        )
        .await;
        let fetched = payload(&fetched);
        assert_eq!(fetched["embedding"].as_array().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_in_result() {
        let mut server = server();
        let missing = NodeId::new().to_string();
        let result = call(&mut server, "kg_get_node", json!({"id": missing})).await;
        assert_eq!(result["isError"], json!(true));
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Not found"));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_reported_in_result() {
        let mut server = server();
        let result = call(&mut server, "kg_get_node", json!({"id": "not-a-uuid"})).await;
        assert_eq!(result["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_relationships_and_delete() {
        let mut server = server();
        let a = payload(&call(&mut server, "kg_create_node", mechanic("Parry", "duel")).await);
        let b = payload(&call(&mut server, "kg_create_node", mechanic("Riposte", "duel")).await);

        let edge = call(
            &mut server,
            "kg_create_relationship",
            json!({"source": a["id"], "target": b["id"], "kind": "generates", "strength": 0.5}),
        )
        .await;
        let edge = payload(&edge);
        assert_eq!(edge["strength"], json!(0.5));

        let listed = payload(
            &call(
                &mut server,
                "kg_get_relationships",
                json!({"id": b["id"], "direction": "in"}),
            )
            .await,
        );
        assert_eq!(listed["total"], 1);

        let deleted = payload(&call(&mut server, "kg_delete_node", json!({"id": a["id"]})).await);
        assert_eq!(deleted["relationshipsRemoved"].as_array().unwrap().len(), 1);

        let stats = payload(&call(&mut server, "kg_stats", json!({})).await);
        assert_eq!(stats["nodes"], 1);
        assert_eq!(stats["edges"], 0);
    }

    #[tokio::test]
    async fn test_update_graph_batch() {
        let mut server = server();
        let result = call(
            &mut server,
            "kg_update_graph",
            json!({"operations": [
                {"op": "create", "node": mechanic("Parry", "duel")},
                {"op": "delete", "id": NodeId::new().to_string()},
                {"op": "create", "node": mechanic("Dodge", "duel")},
            ]}),
        )
        .await;
        let report = payload(&result);
        assert_eq!(report["applied"].as_array().unwrap().len(), 1);
        assert_eq!(report["failed"]["index"], 1);
    }

    #[tokio::test]
    async fn test_validate_canon_requires_subject() {
        let mut server = server();
        let result = call(&mut server, "kg_validate_canon", json!({})).await;
        assert_eq!(result["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_validate_draft_against_explicit_constraint() {
        let mut server = server();
        let rule = payload(
            &call(
                &mut server,
                "kg_create_node",
                json!({
                    "name": "No firearms",
                    "description": "medieval setting",
                    "properties": {
                        "type": "constraint",
                        "rule": {"kind": "forbid_terms", "terms": ["rifle"]},
                        "enforced": true
                    }
                }),
            )
            .await,
        );

        let report = payload(
            &call(
                &mut server,
                "kg_validate_canon",
                json!({
                    "node": mechanic("Rifle drill", "duel"),
                    "constraint_ids": [rule["id"]]
                }),
            )
            .await,
        );
        assert_eq!(report["valid"], json!(false));
        assert_eq!(report["violations"][0]["kind"], "constraint");
    }

    #[tokio::test]
    async fn test_resources_round_trip() {
        let mut server = server();
        call(&mut server, "kg_create_node", mechanic("Parry", "duel")).await;

        let listed = server
            .handle_request(request(5, "resources/list", json!({})))
            .await
            .unwrap()
            .result
            .unwrap();
        assert_eq!(listed["resources"].as_array().unwrap().len(), 2);

        let read = server
            .handle_request(request(
                6,
                "resources/read",
                json!({"uri": "canongraph://project/duel/context"}),
            ))
            .await
            .unwrap()
            .result
            .unwrap();
        assert_eq!(read["contents"][0]["mimeType"], "application/json");

        let missing = server
            .handle_request(request(7, "resources/read", json!({"uri": "canongraph://x"})))
            .await
            .unwrap();
        assert_eq!(missing.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_persistent_graph_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            KnowledgeGraph::open(
                dir.path(),
                Arc::new(HashingEmbedder::new(64).unwrap()),
                KnowledgeConfig::default(),
            )
            .unwrap()
        };

        let mut server = McpServer::new(Arc::new(open()));
        call(&mut server, "kg_create_node", mechanic("Parry", "duel")).await;
        server
            .serve(Transport::new(&b""[..], Vec::new()))
            .await
            .unwrap();
        drop(server);

        let mut server = McpServer::new(Arc::new(open()));
        let listed = payload(&call(&mut server, "kg_list_nodes", json!({"node_type": "mechanic"})).await);
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["nodes"][0]["name"], "Parry");
    }

    #[tokio::test]
    async fn test_serve_over_buffers() {
        let mut server = server();
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "garbage\n",
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n",
        )
        .as_bytes()
        .to_vec();
        let mut output = Vec::new();
        server
            .serve(Transport::new(&input[..], &mut output))
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(lines[2]["result"]["tools"].as_array().unwrap().len(), 19);
    }
}
