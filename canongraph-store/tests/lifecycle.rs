mod common;

use std::sync::Arc;
use std::time::Duration;

use canongraph_store::{
    Direction, GraphStore, KnowledgeConfig, KnowledgeError, KnowledgeGraph, Node, NodePatch,
    NodeType, Relationship, RelationshipType, RocksGraphStore, VectorIndex,
};
use common::{at, graph, graph_with_index, z, FailingVectorIndex, MapEmbedder};

fn lore(name: &str) -> canongraph_store::NewNode {
    Node::builder()
        .name(name)
        .description("a tale told in the harbor")
        .lore("harbor")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_vector_failure_leaves_neither_store_written() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    let index = Arc::new(FailingVectorIndex::default());
    let kg = graph_with_index(embedder, index.clone());

    index.set_failing(true);
    assert!(kg.create_node(lore("Tide")).await.is_err());
    assert!(kg.list_nodes(None).unwrap().is_empty());
    assert_eq!(index.len(), 0);

    index.set_failing(false);
    let node = kg.create_node(lore("Tide")).await.unwrap();
    assert_eq!(kg.get_node(&node.id).unwrap().id, node.id);
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn test_provider_failure_is_embedding_error() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    embedder.set_offline(true);
    let kg = graph(embedder);

    let err = kg.create_node(lore("Tide")).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::Embedding(_)));
    assert!(kg.list_nodes(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_timeout_fails_cleanly() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    embedder.set_delay(Duration::from_millis(500));
    let mut config = common::test_config();
    config.embedding.timeout_ms = 20;
    let kg = KnowledgeGraph::in_memory(embedder, config);

    let err = kg.create_node(lore("Tide")).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::Embedding(ref msg) if msg.contains("timed out")));
    assert!(kg.list_nodes(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_dimension_mismatch_rolls_back() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    embedder.set("Reef", vec![1.0, 0.0]);
    let kg = graph(embedder);

    kg.create_node(lore("Tide")).await.unwrap();
    let err = kg.create_node(lore("Reef")).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::DimensionMismatch { expected: 3, actual: 2 }));
    assert_eq!(kg.list_nodes(None).unwrap().len(), 1);
}

#[tokio::test]
async fn test_every_update_bumps_version_by_one() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    embedder.set("Spring Tide", at(10.0));
    let kg = graph(embedder);

    let node = kg.create_node(lore("Tide")).await.unwrap();
    assert_eq!(node.version(), 1);

    let mut previous = node.version();
    for patch in [
        NodePatch::default().tags(vec!["sea".to_string()]),
        NodePatch::default().name("Spring Tide"),
        NodePatch::default().description("told at the new moon"),
    ] {
        let updated = kg.update_node(&node.id, patch).await.unwrap();
        assert_eq!(updated.version(), previous + 1);
        assert!(updated.stamp.modified_at >= updated.stamp.created_at);
        previous = updated.version();
    }

    let stored = kg.get_node(&node.id).unwrap();
    assert_eq!(stored.version(), 4);
    assert_eq!(stored.embedding, at(10.0));
}

#[tokio::test]
async fn test_update_missing_node_not_found() {
    let kg = graph(MapEmbedder::new(3));
    let err = kg
        .update_node(&canongraph_store::NodeId::new(), NodePatch::default().name("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::NotFound(_)));
}

#[tokio::test]
async fn test_edges_require_existing_endpoints() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    let kg = graph(embedder);
    let node = kg.create_node(lore("Tide")).await.unwrap();

    let err = kg
        .create_relationship(node.id, canongraph_store::NodeId::new(), RelationshipType::References, None)
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::DanglingReference { .. }));
    assert!(kg.get_relationships(&node.id, Direction::Both).unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_every_edge() {
    let embedder = MapEmbedder::new(3);
    for (name, vector) in [("Tide", at(0.0)), ("Reef", at(45.0)), ("Wreck", z())] {
        embedder.set(name, vector);
    }
    let kg = graph(embedder);
    let tide = kg.create_node(lore("Tide")).await.unwrap();
    let reef = kg.create_node(lore("Reef")).await.unwrap();
    let wreck = kg.create_node(lore("Wreck")).await.unwrap();

    kg.create_relationship(tide.id, reef.id, RelationshipType::References, Some(0.5))
        .await
        .unwrap();
    kg.create_relationship(reef.id, wreck.id, RelationshipType::Extends, None)
        .await
        .unwrap();
    kg.create_relationship(wreck.id, reef.id, RelationshipType::SimilarTo, None)
        .await
        .unwrap();

    let removed = kg.delete_node(&reef.id).await.unwrap();
    assert_eq!(removed.len(), 3);
    assert!(kg.get_node(&reef.id).is_err());

    // every remaining edge has live endpoints
    for node in kg.list_nodes(None).unwrap() {
        for edge in kg.get_relationships(&node.id, Direction::Both).unwrap() {
            assert!(kg.get_node(&edge.source).is_ok());
            assert!(kg.get_node(&edge.target).is_ok());
        }
    }
    assert_eq!(kg.stats().unwrap().edges, 0);
}

#[tokio::test]
async fn test_relate_twice_replaces_edge_and_clamps_strength() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    embedder.set("Reef", at(45.0));
    let kg = graph(embedder);
    let a = kg.create_node(lore("Tide")).await.unwrap();
    let b = kg.create_node(lore("Reef")).await.unwrap();

    kg.create_relationship(a.id, b.id, RelationshipType::Uses, None)
        .await
        .unwrap();
    let edge = kg
        .create_relationship(a.id, b.id, RelationshipType::Uses, Some(3.0))
        .await
        .unwrap();
    assert_eq!(edge.strength, 1.0);
    assert_eq!(kg.get_relationships(&a.id, Direction::Out).unwrap().len(), 1);

    assert!(kg
        .create_relationship(a.id, b.id, RelationshipType::Uses, Some(f32::NAN))
        .await
        .is_err());

    kg.remove_relationship(&edge.id).await.unwrap();
    assert!(matches!(
        kg.remove_relationship(&edge.id).await,
        Err(KnowledgeError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_traverse_follows_outgoing_edges() {
    let embedder = MapEmbedder::new(3);
    for (i, name) in ["A", "B", "C", "D"].iter().enumerate() {
        embedder.set(name, at(i as f32 * 20.0));
    }
    let kg = graph(embedder);
    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        ids.push(kg.create_node(lore(name)).await.unwrap().id);
    }
    kg.create_relationship(ids[0], ids[1], RelationshipType::DependsOn, None)
        .await
        .unwrap();
    kg.create_relationship(ids[1], ids[2], RelationshipType::DependsOn, None)
        .await
        .unwrap();
    kg.create_relationship(ids[3], ids[0], RelationshipType::DependsOn, None)
        .await
        .unwrap();

    let reached: Vec<_> = kg
        .traverse(&ids[0], 2, None)
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(reached, vec![ids[1], ids[2]]);
    assert!(kg
        .traverse(&ids[0], 2, Some(&[RelationshipType::Uses]))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_persistent_graph_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));
    embedder.set("Reef", at(30.0));

    let (tide, reef) = {
        let kg = KnowledgeGraph::open(dir.path(), embedder.clone(), KnowledgeConfig::default())
            .unwrap();
        let tide = kg.create_node(lore("Tide")).await.unwrap();
        let reef = kg.create_node(lore("Reef")).await.unwrap();
        kg.create_relationship(tide.id, reef.id, RelationshipType::References, Some(0.7))
            .await
            .unwrap();
        kg.update_node(&reef.id, NodePatch::default().tags(vec!["reef".to_string()]))
            .await
            .unwrap();
        kg.flush().unwrap();
        (tide, reef)
    };

    let kg = KnowledgeGraph::open(dir.path(), embedder, KnowledgeConfig::default()).unwrap();
    let stored = kg.get_node(&reef.id).unwrap();
    assert_eq!(stored.version(), 2);
    assert_eq!(stored.tags, vec!["reef"]);
    assert_eq!(stored.embedding, at(30.0));
    assert_eq!(stored.node_type(), NodeType::Lore);

    let edges = kg.get_relationships(&tide.id, Direction::Out).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].strength, 0.7);
    assert!(kg.check_consistency().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_reopen_removes_node_left_without_vector() {
    let dir = tempfile::TempDir::new().unwrap();
    let embedder = MapEmbedder::new(3);
    embedder.set("Tide", at(0.0));

    let tide = {
        let kg = KnowledgeGraph::open(dir.path(), embedder.clone(), KnowledgeConfig::default())
            .unwrap();
        let tide = kg.create_node(lore("Tide")).await.unwrap();
        kg.flush().unwrap();
        tide
    };

    // A create interrupted after the graph write: record and edge, no vector
    let ghost = lore("Ghost").into_node(at(45.0));
    {
        let store = RocksGraphStore::open(dir.path().join("graph")).unwrap();
        store.put_node(&ghost).unwrap();
        store
            .add_edge(Relationship::new(tide.id, ghost.id, RelationshipType::References))
            .unwrap();
        store.flush().unwrap();
    }

    let kg = KnowledgeGraph::open(dir.path(), embedder, KnowledgeConfig::default()).unwrap();
    let nodes = kg.list_nodes(None).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, tide.id);
    assert!(matches!(kg.get_node(&ghost.id), Err(KnowledgeError::NotFound(_))));
    assert!(kg.get_relationships(&tide.id, Direction::Both).unwrap().is_empty());
    assert!(kg.find_by_tag("harbor").is_ok());
    assert!(kg.check_consistency().await.unwrap().is_consistent());
}
