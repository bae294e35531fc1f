//! # ragline
//!
//! A Retrieval-Augmented Generation pipeline: document normalization and
//! chunking, batched embedding with order-preserving reassembly, cosine
//! similarity search over a pluggable vector store, and grounded
//! generation with citations — including a streaming variant with a strict
//! token-ordering contract.
//!
//! ## Overview
//!
//! - [`DocumentProcessor`] + [`Chunker`] turn raw input into ordered,
//!   addressable [`DocumentChunk`]s.
//! - [`BatchEmbedder`] partitions texts into provider batches and
//!   reassembles embeddings in input order.
//! - [`VectorStore`] stores self-describing vectors and answers exact
//!   cosine-similarity searches; [`InMemoryVectorStore`] is the volatile
//!   reference backend.
//! - [`RagPipeline`] composes the above with a [`ChatModel`] to implement
//!   indexing, retrieval, [`query`](RagPipeline::query), and
//!   [`stream_query`](RagPipeline::stream_query).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragline::{
//!     DocumentInput, InMemoryVectorStore, MockChatModel, MockEmbeddingProvider,
//!     RagConfig, RagPipeline, RagRequest,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(MockEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chat_model(Arc::new(MockChatModel::new("grounded answer")))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! pipeline.index_document(DocumentInput::new("some content"), &cancel).await?;
//! let response = pipeline.query(RagRequest::new("a question"), &cancel).await?;
//! ```
//!
//! ## Concurrency
//!
//! All provider calls are async; the in-memory similarity scan runs to
//! completion without suspension. Upserts and deletes are safe under
//! concurrent invocation; a search running concurrently with an upsert may
//! or may not observe it (documented eventual consistency for this
//! read-mostly workload). Every pipeline entry point takes a
//! `CancellationToken`; cancellation surfaces as
//! [`RagError::Cancelled`](error::RagError::Cancelled), never as a partial
//! result.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod reranker;
pub mod vectorstore;

pub use chunking::{Chunker, DocumentProcessor, FixedSizeChunker, ParagraphChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    DocumentChunk, DocumentInput, Metadata, MetadataValue, ProcessedDocument, RetrievalResult,
    ScoredChunk,
};
pub use embedding::{
    BatchEmbedder, EmbeddingBatch, EmbeddingOptions, EmbeddingProvider, EmbeddingResult,
    IndexedEmbedding, embedding_dimensions_for,
};
pub use error::{RagError, Result};
pub use generation::{
    ChatModel, GenerationOptions, GenerationResponse, Message, Role, TextStream, TokenUsage,
};
pub use inmemory::InMemoryVectorStore;
pub use mock::{MockChatModel, MockEmbeddingProvider};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{
    Citation, IndexingFailure, IndexingReport, IndexingStage, RagPipeline, RagPipelineBuilder,
    RagRequest, RagResponse, RagStreamToken, RetrievalOptions,
};
pub use reranker::{NoOpReranker, Reranker};
pub use vectorstore::{
    HealthStatus, SearchRequest, StoreStats, UpsertError, UpsertOutcome, Vector, VectorMatch,
    VectorStore,
};
