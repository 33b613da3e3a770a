//! # HNSW Tests
//!
//! Exact-match recall, cosine ranking, scale invariance and behavior under
//! re-insertion and larger graphs.

use kore_core::config::HnswConfig;
use kore_index::HnswIndex;

fn index() -> HnswIndex {
    HnswIndex::new(HnswConfig::default())
}

// =============================================================================
// Exact matches
// =============================================================================

#[test]
fn inserted_vector_is_its_own_nearest_neighbor() {
    let index = index();
    index.insert("target", vec![0.3, 0.7, 0.1]);
    index.insert("other", vec![-0.5, 0.2, 0.9]);

    let hits = index.search(&[0.3, 0.7, 0.1], 1);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "target");
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
}

#[test]
fn orthogonal_vectors_rank_by_cosine() {
    let index = index();
    index.insert("a", vec![1.0, 0.0, 0.0]);
    index.insert("b", vec![0.0, 1.0, 0.0]);
    index.insert("c", vec![1.0, 0.0, 0.0]);
    index.insert("d", vec![-1.0, 0.0, 0.0]);

    let hits = index.search(&[1.0, 0.0, 0.0], 4);
    assert_eq!(hits.len(), 4);

    let top_two: Vec<&str> = hits[..2].iter().map(|(id, _)| id.as_str()).collect();
    assert!(top_two.contains(&"a"));
    assert!(top_two.contains(&"c"));
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
    assert!((hits[1].1 - 1.0).abs() < 1e-3);
    assert!((hits[2].1 - 0.0).abs() < 1e-3);
    assert_eq!(hits[3].0, "d");
    assert!((hits[3].1 + 1.0).abs() < 1e-3);
}

#[test]
fn cosine_is_scale_invariant() {
    let index = index();
    index.insert("unit", vec![0.6, 0.8]);
    index.insert("scaled", vec![60.0, 80.0]);
    index.insert("off_axis", vec![0.8, -0.6]);

    let hits = index.search(&[6.0, 8.0], 2);
    assert_eq!(hits.len(), 2);
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
    assert!((hits[1].1 - 1.0).abs() < 1e-3);
    let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
    assert!(ids.contains(&"unit"));
    assert!(ids.contains(&"scaled"));
}

// =============================================================================
// Graph behavior
// =============================================================================

#[test]
fn search_caps_results_at_k() {
    let index = index();
    for i in 0..50 {
        let angle = i as f32 * 0.05;
        index.insert(&format!("v{i}"), vec![angle.cos(), angle.sin()]);
    }

    let hits = index.search(&[1.0, 0.0], 10);
    assert_eq!(hits.len(), 10);
    for pair in hits.windows(2) {
        assert!(pair[0].1 >= pair[1].1, "scores must be descending");
    }
}

#[test]
fn recall_on_a_larger_graph() {
    let index = index();
    for i in 0..300 {
        let angle = i as f32 * 0.021;
        index.insert(
            &format!("v{i}"),
            vec![angle.cos(), angle.sin(), (i % 7) as f32 * 0.1],
        );
    }

    // Query the exact vector of a node in the middle of the ring; it must
    // beat its angular neighbors.
    let angle = 150.0f32 * 0.021;
    let hits = index.search(&[angle.cos(), angle.sin(), (150 % 7) as f32 * 0.1], 5);
    assert_eq!(hits.len(), 5);
    assert_eq!(hits[0].0, "v150", "exact vector must surface first");
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
}

#[test]
fn reinsert_replaces_the_vector() {
    let index = index();
    index.insert("a", vec![1.0, 0.0]);
    index.insert("b", vec![0.0, 1.0]);

    // Move "a" onto the y axis; it must now win y-axis queries.
    index.insert("a", vec![0.0, 1.0]);
    assert_eq!(index.len(), 2);

    let hits = index.search(&[0.0, 1.0], 2);
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
    assert!((hits[1].1 - 1.0).abs() < 1e-3);
}

#[test]
fn mismatched_dimension_nodes_are_filtered_from_results() {
    let index = index();
    index.insert("narrow", vec![1.0, 0.0]);
    index.insert("wide", vec![1.0, 0.0, 0.0]);

    let hits = index.search(&[1.0, 0.0], 5);
    let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
    assert!(ids.contains(&"narrow"));
    assert!(!ids.contains(&"wide"));
}

#[test]
fn zero_k_returns_nothing() {
    let index = index();
    index.insert("a", vec![1.0]);
    assert!(index.search(&[1.0], 0).is_empty());
}
