//! # Vector Façade Tests
//!
//! End-to-end inserts, HNSW-backed search after drain, the cold-start brute
//! fallback, and hydration from persisted state.

use tempfile::TempDir;

use kore_db::Database;

async fn open(dir: &TempDir) -> Database {
    Database::open(dir.path()).await.unwrap()
}

#[tokio::test]
async fn exact_vector_surfaces_with_unit_score() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    db.vector_insert("docs", "target", &[0.1, 0.9, 0.3]).await.unwrap();
    db.vector_insert("docs", "other", &[-0.7, 0.1, 0.2]).await.unwrap();
    db.vector_drain("docs").await.unwrap();

    let hits = db.vector_search("docs", &[0.1, 0.9, 0.3], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "target");
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
}

#[tokio::test]
async fn orthogonal_collection_ranks_as_expected() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    db.vector_insert("c", "a", &[1.0, 0.0, 0.0]).await.unwrap();
    db.vector_insert("c", "b", &[0.0, 1.0, 0.0]).await.unwrap();
    db.vector_insert("c", "c", &[1.0, 0.0, 0.0]).await.unwrap();
    db.vector_insert("c", "d", &[-1.0, 0.0, 0.0]).await.unwrap();
    db.vector_drain("c").await.unwrap();

    let hits = db.vector_search("c", &[1.0, 0.0, 0.0], 4).await.unwrap();
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

#[tokio::test]
async fn batch_insert_is_searchable_after_drain() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    let pairs: Vec<(String, Vec<f32>)> = (0..20)
        .map(|i| {
            let angle = i as f32 * 0.3;
            (format!("v{i}"), vec![angle.cos(), angle.sin()])
        })
        .collect();
    db.vector_insert_batch("c", &pairs).await.unwrap();
    db.vector_drain("c").await.unwrap();

    let hits = db.vector_search("c", &[1.0, 0.0], 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].0, "v0");
}

#[tokio::test]
async fn cold_start_falls_back_to_brute_scan() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir).await;
        db.vector_insert("c", "persisted", &[0.6, 0.8]).await.unwrap();
        db.vector_drain("c").await.unwrap();
        db.close().await.unwrap();
    }

    // Fresh process: the HNSW is cold until hydration runs, but search must
    // still answer from the KV path.
    let db = open(&dir).await;
    let hits = db.vector_search("c", &[0.6, 0.8], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "persisted");
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
}

#[tokio::test]
async fn hydration_rebuilds_the_graph_from_persisted_vectors() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir).await;
        for i in 0..50 {
            let angle = i as f32 * 0.1;
            db.vector_insert("c", &format!("v{i}"), &[angle.cos(), angle.sin()])
                .await
                .unwrap();
        }
        db.vector_drain("c").await.unwrap();
        db.close().await.unwrap();
    }

    let db = open(&dir).await;
    // Drain waits for hydration to complete, so this search is HNSW-backed.
    db.vector_drain("c").await.unwrap();
    let hits = db.vector_search("c", &[1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "v0");
    assert!((hits[0].1 - 1.0).abs() < 1e-3);
}

#[tokio::test]
async fn vector_state_is_wiped_with_the_store() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    db.vector_insert("c", "v", &[1.0, 0.0]).await.unwrap();
    db.vector_drain("c").await.unwrap();
    db.wipe().await.unwrap();

    let hits = db.vector_search("c", &[1.0, 0.0], 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn collections_do_not_leak_into_each_other() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;

    db.vector_insert("first", "a", &[1.0, 0.0]).await.unwrap();
    db.vector_insert("second", "b", &[1.0, 0.0]).await.unwrap();
    db.vector_drain("first").await.unwrap();
    db.vector_drain("second").await.unwrap();

    let hits = db.vector_search("first", &[1.0, 0.0], 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "a");
}
