//! # Graph Overlay Tests
//!
//! Bidirectional edges, traversal primitives, label/property indices and
//! the advisory-marker contract.

use tempfile::TempDir;

use kore_db::{Database, Edge, Node};

async fn open(dir: &TempDir) -> Database {
    Database::open(dir.path()).await.unwrap()
}

// =============================================================================
// Nodes
// =============================================================================

#[tokio::test]
async fn node_roundtrips_with_labels_and_properties() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    let node = Node::new("u1")
        .with_label("person")
        .with_property("name", "ada")
        .with_property("city", "oslo");
    db.graph().put_node(&node).await.unwrap();

    let loaded = db.graph().get_node("u1").unwrap().unwrap();
    assert_eq!(loaded, node);
    assert!(db.graph().get_node("missing").unwrap().is_none());
}

#[tokio::test]
async fn label_index_lists_node_ids() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    for id in ["u1", "u2"] {
        db.graph()
            .put_node(&Node::new(id).with_label("person"))
            .await
            .unwrap();
    }
    db.graph()
        .put_node(&Node::new("c1").with_label("company"))
        .await
        .unwrap();

    let mut people = db.graph().node_ids_by_label("person").unwrap();
    people.sort();
    assert_eq!(people, vec!["u1".to_string(), "u2".to_string()]);
}

#[tokio::test]
async fn property_lookup_filters_stale_markers() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    db.graph()
        .put_node(
            &Node::new("u1")
                .with_label("person")
                .with_property("city", "oslo"),
        )
        .await
        .unwrap();

    // Rewrite with a different city; the old marker stays on disk.
    db.graph()
        .put_node(
            &Node::new("u1")
                .with_label("person")
                .with_property("city", "bergen"),
        )
        .await
        .unwrap();

    let oslo = db.graph().get_nodes_by_property("person", "city", "oslo").unwrap();
    assert!(oslo.is_empty(), "stale marker must be filtered");

    let bergen = db
        .graph()
        .get_nodes_by_property("person", "city", "bergen")
        .unwrap();
    assert_eq!(bergen.len(), 1);
    assert_eq!(bergen[0].id, "u1");
}

// =============================================================================
// Edges
// =============================================================================

#[tokio::test]
async fn edges_are_visible_in_both_directions() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    db.graph()
        .put_edge(&Edge::new("u1", "FOLLOWS", "u2"))
        .await
        .unwrap();

    assert_eq!(
        db.graph().outbound_target_ids("u1", "FOLLOWS").unwrap(),
        vec!["u2".to_string()]
    );
    assert_eq!(
        db.graph().inbound_source_ids("u2", "FOLLOWS").unwrap(),
        vec!["u1".to_string()]
    );
}

#[tokio::test]
async fn remove_edge_clears_both_directions() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    db.graph()
        .put_edge(&Edge::new("u1", "FOLLOWS", "u2"))
        .await
        .unwrap();
    db.graph().remove_edge("u1", "FOLLOWS", "u2").await.unwrap();

    assert!(db.graph().outbound_target_ids("u1", "FOLLOWS").unwrap().is_empty());
    assert!(db.graph().inbound_source_ids("u2", "FOLLOWS").unwrap().is_empty());
}

#[tokio::test]
async fn traversals_are_scoped_to_source_and_type() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let graph = db.graph();

    graph.put_edge(&Edge::new("u1", "FOLLOWS", "u2")).await.unwrap();
    graph.put_edge(&Edge::new("u1", "FOLLOWS", "u3")).await.unwrap();
    graph.put_edge(&Edge::new("u1", "BLOCKS", "u4")).await.unwrap();
    graph.put_edge(&Edge::new("u9", "FOLLOWS", "u5")).await.unwrap();

    let mut targets = graph.outbound_target_ids("u1", "FOLLOWS").unwrap();
    targets.sort();
    assert_eq!(targets, vec!["u2".to_string(), "u3".to_string()]);
}

#[tokio::test]
async fn two_hop_traversal_reaches_exactly_the_second_ring() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let graph = db.graph();

    for id in ["u1", "u2", "u3"] {
        graph.put_node(&Node::new(id)).await.unwrap();
    }
    graph.put_edge(&Edge::new("u1", "FOLLOWS", "u2")).await.unwrap();
    graph.put_edge(&Edge::new("u2", "FOLLOWS", "u3")).await.unwrap();

    let mut second_ring = Vec::new();
    for hop1 in graph.outbound_target_ids("u1", "FOLLOWS").unwrap() {
        second_ring.extend(graph.outbound_target_ids(&hop1, "FOLLOWS").unwrap());
    }
    second_ring.sort();
    second_ring.dedup();
    assert_eq!(second_ring, vec!["u3".to_string()]);
}

#[tokio::test]
async fn edge_bodies_carry_properties() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    let edge = Edge::new("u1", "RATED", "m1").with_property("stars", "5");
    db.graph().put_edge(&edge).await.unwrap();

    let loaded = db.graph().get_edge("u1", "RATED", "m1").unwrap().unwrap();
    assert_eq!(loaded, edge);
}

#[tokio::test]
async fn graph_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir).await;
        db.graph()
            .put_node(&Node::new("u1").with_label("person"))
            .await
            .unwrap();
        db.graph()
            .put_edge(&Edge::new("u1", "FOLLOWS", "u2"))
            .await
            .unwrap();
        db.close().await.unwrap();
    }

    let db = open(&dir).await;
    assert!(db.graph().get_node("u1").unwrap().is_some());
    assert_eq!(
        db.graph().outbound_target_ids("u1", "FOLLOWS").unwrap(),
        vec!["u2".to_string()]
    );
}
