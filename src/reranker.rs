//! Reranker trait for re-scoring retrieved chunks.

use async_trait::async_trait;

use crate::document::ScoredChunk;
use crate::error::Result;

/// A reranker that re-scores and reorders retrieved chunks.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond initial vector similarity.
/// The pipeline applies a reranker only when one is installed; by default
/// retrieval returns the vector store's ranking unchanged.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank retrieved chunks given the original query.
    ///
    /// Returns chunks in a new order with potentially updated scores.
    async fn rerank(&self, query: &str, chunks: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>>;
}

/// A no-op reranker that returns chunks unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(&self, _query: &str, chunks: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>> {
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentChunk;

    fn scored(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: DocumentChunk {
                id: id.to_string(),
                document_id: "doc".to_string(),
                content: "content".to_string(),
                chunk_index: 0,
                title: None,
                source: None,
                metadata: Default::default(),
            },
            score,
        }
    }

    #[tokio::test]
    async fn noop_preserves_order_and_scores() {
        let chunks = vec![scored("a", 0.9), scored("b", 0.4)];
        let reranked = NoOpReranker.rerank("query", chunks).await.unwrap();
        assert_eq!(reranked.len(), 2);
        assert_eq!(reranked[0].chunk.id, "a");
        assert_eq!(reranked[0].score, 0.9);
        assert_eq!(reranked[1].chunk.id, "b");
        assert_eq!(reranked[1].score, 0.4);
    }
}
