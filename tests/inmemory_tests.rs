//! Ranking-contract tests for the in-memory vector store.

use std::collections::HashMap;

use proptest::prelude::*;
use ragline::document::Metadata;
use ragline::inmemory::InMemoryVectorStore;
use ragline::vectorstore::{SearchRequest, Vector, VectorStore};

fn vector(id: &str, values: Vec<f32>) -> Vector {
    Vector { id: id.to_string(), values, metadata: Metadata::new() }
}

#[tokio::test]
async fn upsert_then_search_round_trip() {
    let store = InMemoryVectorStore::new();
    let outcome = store.upsert(vec![vector("x", vec![0.3, 0.5, 0.1])]).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.upserted_count, 1);

    let matches = store
        .search(&SearchRequest::new(vec![0.3, 0.5, 0.1], 1).with_min_score(0.0))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "x");
    assert!((matches[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn orthogonal_vectors_rank_by_alignment() {
    let store = InMemoryVectorStore::new();
    store
        .upsert(vec![vector("A", vec![1.0, 0.0, 0.0]), vector("B", vec![0.0, 1.0, 0.0])])
        .await
        .unwrap();

    let matches = store
        .search(&SearchRequest::new(vec![1.0, 0.0, 0.0], 1).with_min_score(0.0))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "A");
    assert!((matches[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn deleted_id_never_returned() {
    let store = InMemoryVectorStore::new();
    store.upsert(vec![vector("x", vec![1.0, 0.0])]).await.unwrap();

    assert!(store.delete("x").await.unwrap());
    let matches =
        store.search(&SearchRequest::new(vec![1.0, 0.0], 10).with_min_score(0.0)).await.unwrap();
    assert!(matches.iter().all(|m| m.id != "x"));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = InMemoryVectorStore::new();
    store.upsert(vec![vector("x", vec![1.0])]).await.unwrap();

    assert!(store.delete("x").await.unwrap());
    assert!(!store.delete("x").await.unwrap());
    assert!(!store.delete("never-existed").await.unwrap());
}

#[tokio::test]
async fn metadata_filters_are_exact_match_and_combined() {
    let store = InMemoryVectorStore::new();
    let mut a = vector("a", vec![1.0, 0.0]);
    a.metadata.insert("category".to_string(), "A".into());
    let mut b = vector("b", vec![1.0, 0.0]);
    b.metadata.insert("category".to_string(), "B".into());
    // "c" has no category at all
    let c = vector("c", vec![1.0, 0.0]);
    store.upsert(vec![a, b, c]).await.unwrap();

    let matches = store
        .search(&SearchRequest::new(vec![1.0, 0.0], 10).with_min_score(0.0).with_filter("category", "A"))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "a");
}

#[tokio::test]
async fn min_score_discards_weak_matches() {
    let store = InMemoryVectorStore::new();
    store
        .upsert(vec![vector("aligned", vec![1.0, 0.0]), vector("orthogonal", vec![0.0, 1.0])])
        .await
        .unwrap();

    let matches = store
        .search(&SearchRequest::new(vec![1.0, 0.0], 10).with_min_score(0.5))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "aligned");
}

#[tokio::test]
async fn stats_and_health_reflect_contents() {
    let store = InMemoryVectorStore::new();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.vector_count, 0);
    assert_eq!(stats.dimensions, None);

    store.upsert(vec![vector("x", vec![1.0, 2.0, 3.0])]).await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.vector_count, 1);
    assert_eq!(stats.dimensions, Some(3));
    assert!(stats.approximate_storage_bytes >= 12);

    let health = store.health_check().await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.details.get("vector_count").map(String::as_str), Some("1"));
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a vector with a normalized embedding and a random id.
fn arb_vector(dim: usize) -> impl Strategy<Value = Vector> {
    ("[a-z]{3,8}", arb_normalized_embedding(dim)).prop_map(|(id, values)| Vector {
        id,
        values,
        metadata: Metadata::new(),
    })
}

mod prop_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// For any stored set, search returns at most `top_k` results in
        /// descending score order.
        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            vectors in proptest::collection::vec(arb_vector(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();

                // Deduplicate by id so upsert replacement cannot shrink the set
                let mut deduped: HashMap<String, Vector> = HashMap::new();
                for vector in &vectors {
                    deduped.entry(vector.id.clone()).or_insert_with(|| vector.clone());
                }
                let unique: Vec<Vector> = deduped.into_values().collect();
                let count = unique.len();

                store.upsert(unique).await.unwrap();
                let results =
                    store.search(&SearchRequest::new(query, top_k)).await.unwrap();
                (results, count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= unique_count);

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
