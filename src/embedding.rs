//! Batched embedding with order-preserving reassembly.
//!
//! [`EmbeddingProvider`] is the transport contract an embedding backend
//! implements: one call per batch, each returned embedding tagged with its
//! batch-local index. [`BatchEmbedder`] partitions input into batches,
//! remaps batch-local indices back to global input positions, and sums
//! token usage, so callers can zip results against their input list
//! regardless of batch boundaries or out-of-order replies within a batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::generation::TokenUsage;

/// Known embedding model → output dimensionality.
///
/// Immutable, constructed once; used to size stores and validate provider
/// configuration up front.
static MODEL_DIMENSIONS: LazyLock<HashMap<&'static str, usize>> = LazyLock::new(|| {
    HashMap::from([
        ("text-embedding-3-small", 1536),
        ("text-embedding-3-large", 3072),
        ("text-embedding-ada-002", 1536),
        ("gemini-embedding-001", 3072),
        ("nomic-embed-text", 768),
    ])
});

/// Look up the output dimensionality of a known embedding model.
pub fn embedding_dimensions_for(model: &str) -> Option<usize> {
    MODEL_DIMENSIONS.get(model).copied()
}

/// One embedding tagged with its batch-local input index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEmbedding {
    /// Position of the source text within the batch that produced it.
    pub index: usize,
    /// The embedding vector.
    pub values: Vec<f32>,
}

/// The reply to a single batch transport call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingBatch {
    /// Embeddings, possibly out of order, each tagged with its batch-local index.
    pub embeddings: Vec<IndexedEmbedding>,
    /// Prompt tokens consumed by this batch call.
    pub prompt_tokens: u64,
}

/// A transport that turns one batch of texts into embeddings.
///
/// Implementations wrap a concrete backend (OpenAI-compatible API, local
/// model, mock). A failed call propagates unchanged; the transport never
/// substitutes sentinel values for texts it could not embed.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Human-readable provider name, used in error context and results.
    fn name(&self) -> &str;

    /// The model used when the caller does not specify one.
    fn default_model(&self) -> &str;

    /// Embed one batch of texts with the given model.
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<EmbeddingBatch>;
}

/// Per-call options for [`BatchEmbedder`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingOptions {
    /// Model override; the provider's default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Batch size override; the embedder's configured default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// The reassembled result of an embedding call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    /// Embeddings ordered to match the input texts positionally.
    pub embeddings: Vec<Vec<f32>>,
    /// The model that produced them.
    pub model: String,
    /// The provider that was called.
    pub provider: String,
    /// Token usage summed across batches.
    pub usage: TokenUsage,
    /// Wall-clock time spent across all batch calls.
    pub duration: Duration,
}

/// Partitions texts into batches, calls the transport once per batch, and
/// reassembles embeddings in input order.
///
/// The global position of each embedding is `batch_start + batch_local
/// index`, which is what makes concurrent or out-of-order batch replies
/// safe to zip against the input.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    default_batch_size: usize,
}

impl BatchEmbedder {
    /// Create a new `BatchEmbedder` with the given default batch size.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, default_batch_size: usize) -> Self {
        Self { provider, default_batch_size }
    }

    /// Return the underlying provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed many texts, preserving input order in the result.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if the effective batch size is zero.
    /// - [`RagError::Cancelled`] if `cancel` fires before a batch is issued.
    /// - Any transport error, propagated unchanged from the failing batch.
    /// - [`RagError::Embedding`] if a reply omits or duplicates an index.
    pub async fn embed_many(
        &self,
        texts: &[String],
        options: &EmbeddingOptions,
        cancel: &CancellationToken,
    ) -> Result<EmbeddingResult> {
        let started = Instant::now();
        let model =
            options.model.clone().unwrap_or_else(|| self.provider.default_model().to_string());

        if texts.is_empty() {
            return Ok(EmbeddingResult {
                embeddings: Vec::new(),
                model,
                provider: self.provider.name().to_string(),
                usage: TokenUsage::default(),
                duration: started.elapsed(),
            });
        }

        let batch_size = options.batch_size.unwrap_or(self.default_batch_size);
        if batch_size == 0 {
            return Err(RagError::Config("batch_size must be greater than zero".to_string()));
        }

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut usage = TokenUsage::default();

        for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(RagError::Cancelled);
            }

            let batch_start = batch_index * batch_size;
            debug!(
                provider = self.provider.name(),
                model = %model,
                batch_index,
                batch_len = batch.len(),
                "embedding batch"
            );

            let reply = self.provider.embed_batch(batch, &model).await?;
            usage.prompt_tokens += reply.prompt_tokens;
            usage.total_tokens += reply.prompt_tokens;

            for embedding in reply.embeddings {
                if embedding.index >= batch.len() {
                    return Err(RagError::Embedding {
                        provider: self.provider.name().to_string(),
                        message: format!(
                            "reply index {} out of range for batch of {}",
                            embedding.index,
                            batch.len()
                        ),
                    });
                }
                let global = batch_start + embedding.index;
                if slots[global].is_some() {
                    return Err(RagError::Embedding {
                        provider: self.provider.name().to_string(),
                        message: format!("duplicate embedding for input {global}"),
                    });
                }
                slots[global] = Some(embedding.values);
            }
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(values) => embeddings.push(values),
                None => {
                    return Err(RagError::Embedding {
                        provider: self.provider.name().to_string(),
                        message: format!("provider returned no embedding for input {i}"),
                    });
                }
            }
        }

        Ok(EmbeddingResult {
            embeddings,
            model,
            provider: self.provider.name().to_string(),
            usage,
            duration: started.elapsed(),
        })
    }

    /// Embed a single text. Equivalent to [`embed_many`](Self::embed_many)
    /// over a one-element input.
    pub async fn embed_one(
        &self,
        text: &str,
        options: &EmbeddingOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let mut result = self.embed_many(&[text.to_string()], options, cancel).await?;
        result.embeddings.pop().ok_or_else(|| RagError::Embedding {
            provider: self.provider.name().to_string(),
            message: "provider returned empty result".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replies with `[index as f32]` per text, in reversed index order.
    struct ReversingProvider;

    #[async_trait]
    impl EmbeddingProvider for ReversingProvider {
        fn name(&self) -> &str {
            "reversing"
        }

        fn default_model(&self) -> &str {
            "test-model"
        }

        async fn embed_batch(&self, texts: &[String], _model: &str) -> Result<EmbeddingBatch> {
            let embeddings = (0..texts.len())
                .rev()
                .map(|i| IndexedEmbedding {
                    index: i,
                    values: vec![texts[i].len() as f32],
                })
                .collect();
            Ok(EmbeddingBatch { embeddings, prompt_tokens: texts.len() as u64 })
        }
    }

    #[tokio::test]
    async fn reassembles_input_order_across_batches() {
        let embedder = BatchEmbedder::new(Arc::new(ReversingProvider), 2);
        let texts: Vec<String> = vec!["a", "bb", "ccc", "dddd", "eeeee"]
            .into_iter()
            .map(String::from)
            .collect();

        let result = embedder
            .embed_many(&texts, &EmbeddingOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        let lengths: Vec<f32> = result.embeddings.iter().map(|e| e[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(result.usage.prompt_tokens, 5);
        assert_eq!(result.model, "test-model");
    }

    #[tokio::test]
    async fn cancellation_before_first_batch() {
        let embedder = BatchEmbedder::new(Arc::new(ReversingProvider), 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = embedder
            .embed_many(&["x".to_string()], &EmbeddingOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Cancelled));
    }

    #[test]
    fn known_model_dimensions() {
        assert_eq!(embedding_dimensions_for("text-embedding-3-small"), Some(1536));
        assert_eq!(embedding_dimensions_for("unknown-model"), None);
    }
}
