//! Vector store trait and its request/response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::Metadata;
use crate::error::Result;

/// A stored embedding with self-describing metadata.
///
/// The `id` equals the id of the chunk the vector represents, so search
/// results trace back to their chunk without a join. Metadata carries
/// `document_id`, `content`, `chunk_index`, `title`, and `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Unique identifier; equals the represented chunk's id.
    pub id: String,
    /// The embedding values. All vectors in one store share one length.
    pub values: Vec<f32>,
    /// Self-describing metadata.
    pub metadata: Metadata,
}

/// A search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Id of the matched vector.
    pub id: String,
    /// Cosine similarity to the query (−1.0..1.0).
    pub score: f32,
    /// The stored metadata, echoed when the request asked for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A similarity search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The query vector.
    pub vector: Vec<f32>,
    /// Maximum number of matches to return.
    pub top_k: usize,
    /// Matches scoring below this are discarded.
    pub min_score: f32,
    /// Exact-match metadata filters, AND-combined. A stored vector missing
    /// a filter key never matches.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub filter: Metadata,
    /// Whether matches carry the stored metadata.
    pub include_metadata: bool,
}

impl SearchRequest {
    /// Create a request with the given query vector and `top_k`, no score
    /// floor, no filters, metadata included.
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self { vector, top_k, min_score: f32::MIN, filter: Metadata::new(), include_metadata: true }
    }

    /// Set the minimum score.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Add an exact-match metadata filter.
    pub fn with_filter(
        mut self,
        key: impl Into<String>,
        value: impl Into<crate::document::MetadataValue>,
    ) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    /// Set whether matches carry stored metadata.
    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

/// A per-vector upsert rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertError {
    /// Id of the rejected vector.
    pub id: String,
    /// Why it was rejected.
    pub message: String,
}

/// The itemized outcome of an upsert batch.
///
/// Rejections never abort the batch: `upserted_count` reports how many
/// vectors did succeed and `errors` lists the rest. The caller decides
/// whether partial indexing is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// True when every vector in the batch was stored.
    pub success: bool,
    /// How many vectors were stored.
    pub upserted_count: usize,
    /// One entry per rejected vector.
    pub errors: Vec<UpsertError>,
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of stored vectors.
    pub vector_count: usize,
    /// The adopted dimensionality, if any vector has been stored.
    pub dimensions: Option<usize>,
    /// Rough in-memory footprint of the stored data.
    pub approximate_storage_bytes: usize,
}

/// Backend health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the backend is serving requests.
    pub healthy: bool,
    /// Short human-readable status.
    pub status: String,
    /// Backend-specific details.
    pub details: std::collections::HashMap<String, String>,
}

/// A storage backend for embeddings with similarity search.
///
/// The in-memory reference implementation is volatile; durable backends
/// implement this same contract and are drop-in substitutable.
///
/// A store starts with no fixed dimension and adopts the length of the
/// first successfully upserted vector; later vectors of a different length
/// are rejected per-vector.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert vectors. Replaces existing entries with the same id; collects
    /// per-vector rejections instead of aborting the batch.
    async fn upsert(&self, vectors: Vec<Vector>) -> Result<UpsertOutcome>;

    /// Search for the most similar stored vectors.
    ///
    /// Ranking contract (exact, full scan): apply metadata equality
    /// filters, score remaining vectors by cosine similarity (zero-norm
    /// vectors score 0.0), discard scores below `min_score`, sort by
    /// descending score with ties broken by earlier insertion, return the
    /// first `top_k`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`](crate::error::RagError::Validation)
    /// if the query vector's length differs from the store's adopted
    /// dimension.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<VectorMatch>>;

    /// Delete a vector by id. Idempotent: returns `false` for an absent id.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Report store statistics.
    async fn stats(&self) -> Result<StoreStats>;

    /// Report backend health.
    async fn health_check(&self) -> Result<HealthStatus>;
}
