//! Mock backends for tests and local development.

use async_trait::async_trait;
use futures::StreamExt;

use crate::embedding::{EmbeddingBatch, EmbeddingProvider, IndexedEmbedding};
use crate::error::Result;
use crate::generation::{
    ChatModel, GenerationOptions, GenerationResponse, Message, TextStream, TokenUsage,
};

/// A deterministic embedding provider for tests.
///
/// Hashes each text into a fixed-dimension vector, so equal texts embed
/// equally and similarity is stable across runs. No network, no tokens.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    /// Create a provider emitting vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Spread a text's bytes over `dim` buckets and L2-normalize.
fn hash_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut values = vec![0.0f32; dim];
    for (i, byte) in text.bytes().enumerate() {
        values[i % dim] += byte as f32;
    }
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut values {
            *v /= norm;
        }
    }
    values
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-embedding"
    }

    async fn embed_batch(&self, texts: &[String], _model: &str) -> Result<EmbeddingBatch> {
        let embeddings = texts
            .iter()
            .enumerate()
            .map(|(index, text)| IndexedEmbedding {
                index,
                values: hash_embedding(text, self.dimensions),
            })
            .collect();
        Ok(EmbeddingBatch {
            embeddings,
            prompt_tokens: texts.iter().map(|t| t.split_whitespace().count() as u64).sum(),
        })
    }
}

/// A canned-response chat model for tests.
///
/// `generate` returns the configured content in one piece; the streaming
/// variant yields the configured fragments one by one.
pub struct MockChatModel {
    fragments: Vec<String>,
}

impl MockChatModel {
    /// Create a model that replies with the given text as a single fragment.
    pub fn new(content: impl Into<String>) -> Self {
        Self { fragments: vec![content.into()] }
    }

    /// Create a model that streams the given fragments in order.
    pub fn with_fragments(fragments: Vec<String>) -> Self {
        Self { fragments }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock-chat"
    }

    async fn generate(
        &self,
        _messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<GenerationResponse> {
        let content = self.fragments.concat();
        let completion_tokens = content.split_whitespace().count() as u64;
        Ok(GenerationResponse {
            content,
            model_id: "mock-chat".to_string(),
            usage: TokenUsage {
                prompt_tokens: 0,
                completion_tokens,
                total_tokens: completion_tokens,
            },
        })
    }

    async fn generate_stream(
        &self,
        _messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<TextStream> {
        let fragments = self.fragments.clone();
        Ok(futures::stream::iter(fragments).map(Ok).boxed())
    }
}
