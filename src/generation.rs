//! The consumed text-generation capability.
//!
//! The pipeline conditions a downstream chat/completion call on retrieved
//! context. The call itself is external: implementations of [`ChatModel`]
//! wrap a concrete backend (OpenAI-compatible API, local model, mock)
//! behind a unified async interface with a streaming variant.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions to the model.
    System,
    /// End-user input.
    User,
    /// Prior model output.
    Assistant,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Options forwarded to the generation backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<usize>,
    /// Backend model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Token counts reported by a provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt/input.
    pub prompt_tokens: u64,
    /// Tokens produced by the model.
    pub completion_tokens: u64,
    /// Total tokens for the call.
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A completed (non-streaming) generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The generated text.
    pub content: String,
    /// Identifier of the model that produced it.
    pub model_id: String,
    /// Token usage for the call.
    pub usage: TokenUsage,
}

/// A stream of generated text fragments, in model emission order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A provider-agnostic chat/completion backend.
///
/// Retry and backoff policy belongs to implementations, not to the
/// pipeline: a failed call propagates unchanged.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Human-readable backend name, used in error context.
    fn name(&self) -> &str;

    /// Generate a complete response for the given messages.
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse>;

    /// Stream a response as text fragments, in the order the model emits
    /// them. The stream ends when generation is exhausted.
    async fn generate_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<TextStream>;
}
