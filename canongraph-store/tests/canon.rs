mod common;

use canongraph_store::{
    ConstraintRule, KnowledgeError, NewNode, Node, NodePatch, RelationshipType, ValidationState,
    ViolationAction, ViolationKind,
};
use common::{at, graph, z, MapEmbedder};

fn card_design() -> NewNode {
    Node::builder()
        .name("Card corners")
        .description("rounded corners on all cards")
        .design("ui")
        .build()
        .unwrap()
}

fn constraint(name: &str, rule: ConstraintRule, enforced: bool) -> NewNode {
    Node::builder()
        .name(name)
        .constraint(rule, enforced)
        .build()
        .unwrap()
}

fn no_rounded_corners() -> ConstraintRule {
    ConstraintRule::ForbidTerms {
        terms: vec!["rounded corners".to_string()],
    }
}

#[tokio::test]
async fn test_conflicting_design_is_invalid() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Card corners", at(0.0));
    embedder.set("Sharp edges", z());
    let kg = graph(embedder);

    let a = kg.create_node(card_design()).await.unwrap();
    let b = kg
        .create_node(constraint("Sharp edges", no_rounded_corners(), true))
        .await
        .unwrap();
    let edge = kg
        .create_relationship(a.id, b.id, RelationshipType::ConflictsWith, None)
        .await
        .unwrap();

    let report = kg.validate_canon(&a, &[b.clone()]).await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.state, ValidationState::ViolationsFound);

    let referencing: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.edge.as_ref() == Some(&edge.id))
        .collect();
    assert_eq!(referencing.len(), 1);
    assert_eq!(referencing[0].kind, ViolationKind::Inconsistency);
    assert_eq!(referencing[0].action, ViolationAction::Block);
    assert_eq!(referencing[0].related, Some(b.id));

    // the rule itself fails too, and blocks because it is enforced
    let failed_rule: Vec<_> = report.of_kind(ViolationKind::Constraint).collect();
    assert_eq!(failed_rule.len(), 1);
    assert_eq!(failed_rule[0].constraint, Some(b.id));
}

#[tokio::test]
async fn test_conflict_with_advisory_constraint_is_single_violation() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Card corners", at(0.0));
    embedder.set("No rounded corners", z());
    let kg = graph(embedder);

    let a = kg.create_node(card_design()).await.unwrap();
    let b = kg
        .create_node(constraint(
            "No rounded corners",
            ConstraintRule::Manual {
                guidance: "no rounded corners".to_string(),
            },
            true,
        ))
        .await
        .unwrap();
    kg.create_relationship(a.id, b.id, RelationshipType::ConflictsWith, None)
        .await
        .unwrap();

    let report = kg.validate_canon(&a, &[b]).await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.violations.len(), 1);
    assert!(report.violations[0].edge.is_some());
    assert!(report
        .suggestions
        .iter()
        .any(|s| s.contains("no rounded corners")));
}

#[tokio::test]
async fn test_conflict_seen_from_either_end() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Card corners", at(0.0));
    embedder.set("Sharp edges", z());
    let kg = graph(embedder);
    let a = kg.create_node(card_design()).await.unwrap();
    let b = kg
        .create_node(constraint("Sharp edges", no_rounded_corners(), false))
        .await
        .unwrap();
    kg.create_relationship(b.id, a.id, RelationshipType::ConflictsWith, None)
        .await
        .unwrap();

    let report = kg.validate_canon(&a, &[]).await.unwrap();
    assert_eq!(report.of_kind(ViolationKind::Inconsistency).count(), 1);
    assert!(!report.valid);
}

#[tokio::test]
async fn test_near_duplicate_is_a_warning() {
    let embedder = MapEmbedder::new(3);
    embedder.set("First", at(0.0));
    embedder.set("Second", at(15.0)); // cos 15deg = 0.966
    embedder.set("Third", at(60.0));
    let kg = graph(embedder);

    let first = kg
        .create_node(Node::builder().name("First").design("ui").build().unwrap())
        .await
        .unwrap();
    let second = kg
        .create_node(Node::builder().name("Second").design("ui").build().unwrap())
        .await
        .unwrap();
    let third = kg
        .create_node(Node::builder().name("Third").design("ui").build().unwrap())
        .await
        .unwrap();

    let report = kg.validate_canon(&second, &[]).await.unwrap();
    let duplicates: Vec<_> = report.of_kind(ViolationKind::Duplicate).collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].related, Some(first.id));
    assert_eq!(duplicates[0].action, ViolationAction::Warn);
    assert!(report.valid);

    let report = kg.validate_canon(&third, &[]).await.unwrap();
    assert_eq!(report.of_kind(ViolationKind::Duplicate).count(), 0);
    assert_eq!(report.state, ValidationState::Valid);
}

#[tokio::test]
async fn test_style_drift_against_baseline() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Palette", at(0.0));
    embedder.set("Lighting", at(5.0));
    embedder.set("On style", at(20.0));
    embedder.set("Off style", at(80.0));
    let kg = graph(embedder);

    for name in ["Palette", "Lighting"] {
        kg.create_node(
            Node::builder()
                .name(name)
                .design("art")
                .tag("style-baseline")
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    }
    let on = kg
        .create_node(Node::builder().name("On style").design("art").build().unwrap())
        .await
        .unwrap();
    let off = kg
        .create_node(Node::builder().name("Off style").design("art").build().unwrap())
        .await
        .unwrap();

    let report = kg.validate_canon(&on, &[]).await.unwrap();
    assert_eq!(report.of_kind(ViolationKind::StyleDrift).count(), 0);

    let report = kg.validate_canon(&off, &[]).await.unwrap();
    let drift: Vec<_> = report.of_kind(ViolationKind::StyleDrift).collect();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].action, ViolationAction::Warn);
    assert!(report.valid);
}

#[tokio::test]
async fn test_enforced_global_constraint_blocks_write() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Sharp edges", z());
    embedder.set("Card corners", at(0.0));
    embedder.set("Card frame", at(10.0));
    let kg = graph(embedder);

    kg.create_node(
        Node::builder()
            .name("Sharp edges")
            .global_constraint(no_rounded_corners(), true)
            .build()
            .unwrap(),
    )
    .await
    .unwrap();

    let err = kg.create_node(card_design()).await.unwrap_err();
    let report = err.validation_report().expect("blocked write carries its report");
    assert_eq!(report.blocking().count(), 1);
    assert_eq!(kg.list_nodes(None).unwrap().len(), 1);

    // updates are checked too, and leave the stored node untouched
    let frame = kg
        .create_node(
            Node::builder()
                .name("Card frame")
                .description("square frame")
                .design("ui")
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    let err = kg
        .update_node(&frame.id, NodePatch::default().description("rounded corners everywhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::ValidationBlocked(_)));
    assert_eq!(kg.get_node(&frame.id).unwrap().version(), 1);
}

#[tokio::test]
async fn test_advisory_global_constraint_allows_write() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Sharp edges", z());
    embedder.set("Card corners", at(0.0));
    let kg = graph(embedder);

    kg.create_node(
        Node::builder()
            .name("Sharp edges")
            .global_constraint(no_rounded_corners(), false)
            .build()
            .unwrap(),
    )
    .await
    .unwrap();

    let card = kg.create_node(card_design()).await.unwrap();
    let report = kg.validate_node(&card.id).unwrap();
    assert!(report.valid);
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, ViolationKind::Constraint);
}

#[tokio::test]
async fn test_validate_node_uses_linked_constraints() {
    let embedder = MapEmbedder::new(3);
    embedder.set("Card corners", at(0.0));
    embedder.set("Needs rationale", z());
    let kg = graph(embedder);

    let card = kg.create_node(card_design()).await.unwrap();
    let rule = kg
        .create_node(constraint(
            "Needs rationale",
            ConstraintRule::RequireProperty {
                key: "rationale".to_string(),
            },
            true,
        ))
        .await
        .unwrap();

    assert!(kg.validate_node(&card.id).unwrap().valid);

    kg.create_relationship(card.id, rule.id, RelationshipType::Implements, None)
        .await
        .unwrap();
    let report = kg.validate_node(&card.id).unwrap();
    assert!(!report.valid);
    assert_eq!(report.blocking().next().and_then(|v| v.constraint), Some(rule.id));
}
