//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] is the volatile reference backend: a `HashMap`
//! behind a `tokio::sync::RwLock`, scanned in full on every search.
//! Suitable for development, testing, and small corpora; a durable backend
//! implements the same [`VectorStore`] contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::vectorstore::{
    HealthStatus, SearchRequest, StoreStats, UpsertError, UpsertOutcome, Vector, VectorMatch,
    VectorStore,
};

/// A stored vector with its insertion rank for deterministic tie-breaks.
#[derive(Debug, Clone)]
struct StoredVector {
    vector: Vector,
    /// Monotonic insertion rank. Replacing an id keeps its original rank,
    /// so re-upserting cannot reorder exact score ties.
    rank: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    vectors: HashMap<String, StoredVector>,
    /// Adopted from the first successfully upserted vector.
    dimensions: Option<usize>,
}

/// An in-memory vector store using exact cosine-similarity search.
///
/// Upserts and deletes serialize on a write lock; searches share a read
/// lock and may interleave with concurrent writes, so a search is not
/// guaranteed to observe an upsert that is in flight. Each individual call
/// is atomic over the store's contents.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<StoreInner>,
    next_rank: AtomicU64,
}

impl InMemoryVectorStore {
    /// Create a new empty store with no fixed dimension.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude (never divides by zero).
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// True when every filter key is present in `metadata` with an equal value.
fn matches_filter(
    metadata: &crate::document::Metadata,
    filter: &crate::document::Metadata,
) -> bool {
    filter.iter().all(|(key, value)| metadata.get(key) == Some(value))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, vectors: Vec<Vector>) -> Result<UpsertOutcome> {
        let mut inner = self.inner.write().await;
        let mut outcome = UpsertOutcome::default();

        for vector in vectors {
            if vector.values.is_empty() {
                outcome.errors.push(UpsertError {
                    id: vector.id,
                    message: "vector has no values".to_string(),
                });
                continue;
            }

            match inner.dimensions {
                None => inner.dimensions = Some(vector.values.len()),
                Some(expected) if expected != vector.values.len() => {
                    let err = RagError::DimensionMismatch {
                        id: vector.id.clone(),
                        expected,
                        actual: vector.values.len(),
                    };
                    outcome.errors.push(UpsertError { id: vector.id, message: err.to_string() });
                    continue;
                }
                Some(_) => {}
            }

            let rank = match inner.vectors.get(&vector.id) {
                Some(existing) => existing.rank,
                None => self.next_rank.fetch_add(1, Ordering::Relaxed),
            };
            inner.vectors.insert(vector.id.clone(), StoredVector { vector, rank });
            outcome.upserted_count += 1;
        }

        outcome.success = outcome.errors.is_empty();
        Ok(outcome)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<VectorMatch>> {
        let inner = self.inner.read().await;

        // A zip-truncated dot product against a wrong-length query would
        // silently deflate every score; reject it instead.
        if let Some(expected) = inner.dimensions {
            if request.vector.len() != expected {
                return Err(RagError::Validation(format!(
                    "query vector has {} dimensions, store holds {expected}",
                    request.vector.len()
                )));
            }
        }

        let mut scored: Vec<(f32, u64, &StoredVector)> = inner
            .vectors
            .values()
            .filter(|stored| matches_filter(&stored.vector.metadata, &request.filter))
            .map(|stored| {
                (cosine_similarity(&stored.vector.values, &request.vector), stored.rank, stored)
            })
            .filter(|(score, _, _)| *score >= request.min_score)
            .collect();

        // Descending by score; exact ties go to the earlier insertion.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1))
        });
        scored.truncate(request.top_k);

        Ok(scored
            .into_iter()
            .map(|(score, _, stored)| VectorMatch {
                id: stored.vector.id.clone(),
                score,
                metadata: request.include_metadata.then(|| stored.vector.metadata.clone()),
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.vectors.remove(id).is_some())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.read().await;
        let approximate_storage_bytes = inner
            .vectors
            .values()
            .map(|stored| {
                stored.vector.values.len() * std::mem::size_of::<f32>()
                    + stored.vector.id.len()
                    + stored.vector.metadata.len() * 48
            })
            .sum();

        Ok(StoreStats {
            vector_count: inner.vectors.len(),
            dimensions: inner.dimensions,
            approximate_storage_bytes,
        })
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let inner = self.inner.read().await;
        let mut details = HashMap::new();
        details.insert("backend".to_string(), "in-memory".to_string());
        details.insert("vector_count".to_string(), inner.vectors.len().to_string());
        if let Some(dims) = inner.dimensions {
            details.insert("dimensions".to_string(), dims.to_string());
        }

        Ok(HealthStatus { healthy: true, status: "ok".to_string(), details })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn vector(id: &str, values: Vec<f32>) -> Vector {
        Vector { id: id.to_string(), values, metadata: Metadata::new() }
    }

    #[tokio::test]
    async fn adopts_dimension_from_first_upsert() {
        let store = InMemoryVectorStore::new();
        let outcome = store
            .upsert(vec![vector("a", vec![1.0, 0.0]), vector("b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.upserted_count, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].id, "b");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.dimensions, Some(2));
        assert_eq!(stats.vector_count, 1);
    }

    #[tokio::test]
    async fn zero_norm_query_scores_zero() {
        let store = InMemoryVectorStore::new();
        store.upsert(vec![vector("a", vec![1.0, 0.0])]).await.unwrap();

        let matches =
            store.search(&SearchRequest::new(vec![0.0, 0.0], 1).with_min_score(0.0)).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 0.0);
    }

    #[tokio::test]
    async fn mismatched_query_dimension_is_rejected() {
        let store = InMemoryVectorStore::new();
        store.upsert(vec![vector("a", vec![1.0, 0.0, 0.0])]).await.unwrap();

        let err = store.search(&SearchRequest::new(vec![1.0, 0.0], 1)).await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));

        // An empty store has no adopted dimension, so any query is fine.
        let empty = InMemoryVectorStore::new();
        assert!(empty.search(&SearchRequest::new(vec![1.0, 0.0], 1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exact_ties_break_by_insertion_order() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![
                vector("first", vec![1.0, 0.0]),
                vector("second", vec![1.0, 0.0]),
                vector("third", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let matches = store.search(&SearchRequest::new(vec![1.0, 0.0], 3)).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);

        // Re-upserting "first" keeps its original rank.
        store.upsert(vec![vector("first", vec![1.0, 0.0])]).await.unwrap();
        let matches = store.search(&SearchRequest::new(vec![1.0, 0.0], 3)).await.unwrap();
        assert_eq!(matches[0].id, "first");
    }

    #[tokio::test]
    async fn include_metadata_flag_controls_echo() {
        let store = InMemoryVectorStore::new();
        let mut v = vector("a", vec![1.0]);
        v.metadata.insert("k".to_string(), "v".into());
        store.upsert(vec![v]).await.unwrap();

        let with = store.search(&SearchRequest::new(vec![1.0], 1)).await.unwrap();
        assert!(with[0].metadata.is_some());

        let without =
            store.search(&SearchRequest::new(vec![1.0], 1).with_metadata(false)).await.unwrap();
        assert!(without[0].metadata.is_none());
    }
}
