//! Ranking correctness of `nearest` on both store backends.

use crate::chunker::chunk_id;
use crate::store::{DocumentStore, MemoryStore, SqliteStore};
use crate::types::NewChunk;
use tempfile::TempDir;

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn chunk(document: &str, ordinal: u32, text: &str, embedding: &[f32]) -> NewChunk {
    NewChunk {
        id: chunk_id(document, ordinal),
        ordinal,
        content: text.to_string(),
        embedding: Some(normalize(embedding)),
        metadata: serde_json::json!({ "document_name": document }),
    }
}

/// Both backends, the SQLite one kept alive by its temp dir.
fn stores() -> (TempDir, Vec<Box<dyn DocumentStore>>) {
    let temp = TempDir::new().unwrap();
    let sqlite = SqliteStore::open(&temp.path().join("ranking.sqlite")).unwrap();
    (temp, vec![Box::new(MemoryStore::new()), Box::new(sqlite)])
}

async fn seed(store: &dyn DocumentStore) {
    store
        .sync_document(
            "rust",
            "rust.md",
            "h1",
            &[
                chunk("rust", 0, "Ownership and borrowing", &[1.0, 0.1, 0.0]),
                chunk("rust", 1, "Lifetimes in practice", &[0.8, 0.6, 0.0]),
            ],
        )
        .await
        .unwrap();
    store
        .sync_document(
            "cooking",
            "cooking.md",
            "h2",
            &[chunk("cooking", 0, "How to bake bread", &[0.0, 0.1, 1.0])],
        )
        .await
        .unwrap();
    store
        .sync_document(
            "opposite",
            "opposite.md",
            "h3",
            &[chunk("opposite", 0, "Points the other way", &[-1.0, 0.0, 0.0])],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_relevant_chunks_outrank_unrelated() {
    let (_temp, stores) = stores();
    for store in &stores {
        seed(store.as_ref()).await;

        let hits = store.nearest(&normalize(&[1.0, 0.0, 0.0]), 0.0, 10).await.unwrap();
        assert_eq!(hits[0].chunk_id, "rust_chunk_0", "{}", store.backend_name());
        assert_eq!(hits[1].chunk_id, "rust_chunk_1");
        assert!(hits[0].score > 0.9);
        if let Some(cooking) = hits.iter().find(|h| h.document_id == "cooking") {
            assert!(cooking.score < 0.1);
        }
    }
}

#[tokio::test]
async fn test_results_sorted_descending() {
    let (_temp, stores) = stores();
    for store in &stores {
        seed(store.as_ref()).await;

        let hits = store.nearest(&normalize(&[0.5, 0.5, 0.5]), 0.0, 10).await.unwrap();
        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score, "{}", store.backend_name());
        }
    }
}

#[tokio::test]
async fn test_negative_similarity_never_returned() {
    let (_temp, stores) = stores();
    for store in &stores {
        seed(store.as_ref()).await;

        let hits = store.nearest(&normalize(&[1.0, 0.0, 0.0]), 0.0, 10).await.unwrap();
        assert!(hits.iter().all(|h| h.document_id != "opposite"));
        assert!(hits.iter().all(|h| h.score > 0.0));
    }
}

#[tokio::test]
async fn test_empty_store_returns_nothing() {
    let (_temp, stores) = stores();
    for store in &stores {
        let hits = store.nearest(&[1.0, 0.0, 0.0], 0.0, 5).await.unwrap();
        assert!(hits.is_empty(), "{}", store.backend_name());
    }
}

#[tokio::test]
async fn test_top_k_limits_results() {
    let (_temp, stores) = stores();
    for store in &stores {
        seed(store.as_ref()).await;

        let hits = store.nearest(&normalize(&[1.0, 0.3, 0.3]), 0.0, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "rust_chunk_0");
        assert!(store.nearest(&[1.0, 0.0, 0.0], 0.0, 0).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_high_threshold_filters_weak_matches() {
    let (_temp, stores) = stores();
    for store in &stores {
        // cos = 0.5 against [1, 0]
        store
            .sync_document("a", "a.md", "h", &[chunk("a", 0, "half", &[0.5, 0.866_025_4])])
            .await
            .unwrap();

        assert!(store.nearest(&[1.0, 0.0], 0.9, 5).await.unwrap().is_empty());
        assert_eq!(store.nearest(&[1.0, 0.0], 0.3, 5).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_invalid_query_arguments_rejected() {
    let (_temp, stores) = stores();
    for store in &stores {
        seed(store.as_ref()).await;

        assert!(store.nearest(&[1.0, 0.0, 0.0], 1.5, 5).await.is_err());
        assert!(store.nearest(&[1.0, 0.0], 0.0, 5).await.is_err());
    }
}

#[tokio::test]
async fn test_deleted_document_chunks_are_not_queryable() {
    let (_temp, stores) = stores();
    for store in &stores {
        seed(store.as_ref()).await;
        assert!(store.delete_document("rust").await.unwrap());

        let hits = store.nearest(&normalize(&[1.0, 0.1, 0.0]), 0.0, 10).await.unwrap();
        assert!(hits.iter().all(|h| h.document_id != "rust"));
        assert!(store
            .all_chunks()
            .await
            .unwrap()
            .iter()
            .all(|c| c.document_id != "rust"));
        assert!(!store.delete_document("rust").await.unwrap());
    }
}
