//! RAG pipeline orchestrator.
//!
//! [`RagPipeline`] composes a [`DocumentProcessor`], a [`Chunker`], a
//! [`BatchEmbedder`], a [`VectorStore`], and a [`ChatModel`] to implement
//! indexing, retrieval, grounded query, and a streaming query whose token
//! ordering is a hard contract: one `Context` token first, `Content`
//! tokens in generation order, one terminal `Citation` token last.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragline::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chat_model(Arc::new(my_model))
//!     .build()?;
//!
//! pipeline.index_document(document, &cancel).await?;
//! let response = pipeline.query(request, &cancel).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::chunking::{Chunker, DocumentProcessor, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{
    DocumentChunk, DocumentInput, Metadata, MetadataValue, RetrievalResult, ScoredChunk,
};
use crate::embedding::{BatchEmbedder, EmbeddingOptions, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{ChatModel, GenerationOptions, Message, TokenUsage};
use crate::reranker::Reranker;
use crate::vectorstore::{SearchRequest, Vector, VectorMatch, VectorStore};

/// Per-request retrieval options. Unset fields fall back to the
/// pipeline's [`RagConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOptions {
    /// Maximum number of chunks to retrieve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Minimum similarity score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    /// Exact-match metadata filters, AND-combined.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub filter: Metadata,
}

/// A grounded query request.
///
/// `messages` holds the prior conversation; `query` is appended as the
/// final user message after the synthesized context message is prepended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagRequest {
    /// The query text.
    pub query: String,
    /// Prior conversation messages.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Retrieval options for this request.
    #[serde(default)]
    pub retrieval: RetrievalOptions,
    /// Generation options for this request.
    #[serde(default)]
    pub generation: GenerationOptions,
}

impl RagRequest {
    /// Create a request with just a query and defaults everywhere else.
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }
}

/// A reference back to the source chunk backing part of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Id of the source document.
    pub document_id: String,
    /// Title of the source document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// URL of the source document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Relevance score of the backing chunk.
    pub score: f32,
}

/// A complete grounded answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// The generated text.
    pub content: String,
    /// The chunks that informed the answer, best first.
    pub chunks: Vec<ScoredChunk>,
    /// Mean relevance score of the retrieved chunks; 0.0 if none.
    pub confidence: f32,
    /// Identifier of the generation model.
    pub model_id: String,
    /// Token usage of the generation call.
    pub usage: TokenUsage,
    /// One citation per distinct retrieved chunk.
    pub citations: Vec<Citation>,
    /// Total wall-clock time for the request.
    pub duration: Duration,
}

/// A single unit of a streaming query.
///
/// Lifecycle within one stream: `Context` exactly once, first; `Content`
/// zero or more times, in generation order; `Citation` exactly once, last,
/// with `is_complete` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RagStreamToken {
    /// Retrieval metadata, emitted before any generation call.
    Context {
        /// Number of chunks retrieved.
        chunk_count: usize,
        /// Retrieval duration in milliseconds.
        retrieval_ms: u64,
    },
    /// A generated text fragment.
    Content {
        /// The fragment, exactly as the model emitted it.
        text: String,
    },
    /// The terminal token carrying the citation list.
    Citation {
        /// One citation per distinct retrieved chunk.
        citations: Vec<Citation>,
        /// Always `true`; marks the stream complete.
        is_complete: bool,
    },
}

/// The indexing stage at which a document failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStage {
    /// Splitting the processed document into chunks.
    Chunk,
    /// Embedding the chunk texts.
    Embed,
    /// Storing the vectors.
    Upsert,
}

impl std::fmt::Display for IndexingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexingStage::Chunk => write!(f, "chunk"),
            IndexingStage::Embed => write!(f, "embed"),
            IndexingStage::Upsert => write!(f, "upsert"),
        }
    }
}

/// One failed document (or rejected vector) within an indexing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingFailure {
    /// Id of the document that failed.
    pub document_id: String,
    /// The stage that failed.
    pub stage: IndexingStage,
    /// A description of the failure.
    pub message: String,
}

/// The aggregate outcome of an indexing call.
///
/// Batch indexing isolates failures per document: sibling successes are
/// unaffected, and `errors` carries one entry per failed document. Vectors
/// rejected by the store (e.g. dimension mismatch) appear as `Upsert`-stage
/// entries without retracting the vectors that did land; the caller decides
/// whether partial indexing is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexingReport {
    /// True when no document failed and no vector was rejected.
    pub success: bool,
    /// Documents that completed all stages.
    pub documents_indexed: usize,
    /// Chunks produced across all documents.
    pub chunks_created: usize,
    /// Vectors actually stored.
    pub vectors_upserted: usize,
    /// Wall-clock time for the whole call.
    #[serde(skip)]
    pub duration: Duration,
    /// Per-document and per-vector failures.
    pub errors: Vec<IndexingFailure>,
}

/// Outcome of indexing one document, before aggregation.
struct DocOutcome {
    chunks_created: usize,
    vectors_upserted: usize,
    upsert_failures: Vec<IndexingFailure>,
}

/// The RAG pipeline orchestrator.
///
/// Owns request/response assembly only; all durable state lives in the
/// [`VectorStore`]. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    processor: DocumentProcessor,
    chunker: Arc<dyn Chunker>,
    embedder: BatchEmbedder,
    store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatModel>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Return a reference to the batch embedder.
    pub fn embedder(&self) -> &BatchEmbedder {
        &self.embedder
    }

    /// Index a single document: process → chunk → embed → upsert.
    ///
    /// A whitespace-only document is valid and indexes zero chunks.
    /// Vectors rejected during upsert are itemized in the report without
    /// retracting the ones that succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Pipeline`] naming the failing stage and
    /// document, or [`RagError::Cancelled`] if `cancel` fires.
    pub async fn index_document(
        &self,
        input: DocumentInput,
        cancel: &CancellationToken,
    ) -> Result<IndexingReport> {
        let started = Instant::now();
        let processed = self.processor.process(input);
        let document_id = processed.id.clone();

        match self.index_processed(processed, cancel).await? {
            Ok(outcome) => Ok(IndexingReport {
                success: outcome.upsert_failures.is_empty(),
                documents_indexed: 1,
                chunks_created: outcome.chunks_created,
                vectors_upserted: outcome.vectors_upserted,
                duration: started.elapsed(),
                errors: outcome.upsert_failures,
            }),
            Err(failure) => {
                error!(
                    document.id = %document_id,
                    stage = %failure.stage,
                    "indexing failed"
                );
                Err(RagError::Pipeline(format!(
                    "indexing failed at {} stage for document '{}': {}",
                    failure.stage, failure.document_id, failure.message
                )))
            }
        }
    }

    /// Index multiple documents, isolating failures per document.
    ///
    /// One document's failure does not abort its siblings: the aggregate
    /// report counts every success and carries one error entry per failed
    /// document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for an empty input list, or
    /// [`RagError::Cancelled`] if `cancel` fires (remaining documents are
    /// not processed).
    pub async fn index_documents(
        &self,
        inputs: Vec<DocumentInput>,
        cancel: &CancellationToken,
    ) -> Result<IndexingReport> {
        if inputs.is_empty() {
            return Err(RagError::Validation("document list must not be empty".to_string()));
        }

        let started = Instant::now();
        let mut report = IndexingReport::default();

        for input in inputs {
            let processed = self.processor.process(input);
            match self.index_processed(processed, cancel).await? {
                Ok(outcome) => {
                    report.documents_indexed += 1;
                    report.chunks_created += outcome.chunks_created;
                    report.vectors_upserted += outcome.vectors_upserted;
                    report.errors.extend(outcome.upsert_failures);
                }
                Err(failure) => report.errors.push(failure),
            }
        }

        report.success = report.errors.is_empty();
        report.duration = started.elapsed();
        info!(
            documents_indexed = report.documents_indexed,
            error_count = report.errors.len(),
            "batch indexing completed"
        );
        Ok(report)
    }

    /// Run one document through chunk → embed → upsert.
    ///
    /// The outer error is reserved for cancellation; stage failures come
    /// back in the inner `Err` so batch indexing can isolate them.
    async fn index_processed(
        &self,
        processed: crate::document::ProcessedDocument,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<DocOutcome, IndexingFailure>> {
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }
        let document_id = processed.id.clone();

        // 1. Chunk
        let chunks = match self.chunker.chunk(&processed) {
            Ok(chunks) => chunks,
            Err(e) => {
                return Ok(Err(IndexingFailure {
                    document_id,
                    stage: IndexingStage::Chunk,
                    message: e.to_string(),
                }));
            }
        };
        if chunks.is_empty() {
            info!(document.id = %document_id, chunk_count = 0, "indexed document (empty)");
            return Ok(Ok(DocOutcome {
                chunks_created: 0,
                vectors_upserted: 0,
                upsert_failures: Vec::new(),
            }));
        }

        // 2. Embed all chunk texts
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings =
            match self.embedder.embed_many(&texts, &EmbeddingOptions::default(), cancel).await {
                Ok(result) => result.embeddings,
                Err(RagError::Cancelled) => return Err(RagError::Cancelled),
                Err(e) => {
                    return Ok(Err(IndexingFailure {
                        document_id,
                        stage: IndexingStage::Embed,
                        message: e.to_string(),
                    }));
                }
            };

        // 3. Zip chunks with embeddings into self-describing vectors
        let vectors: Vec<Vector> =
            chunks.iter().zip(embeddings).map(|(chunk, values)| vector_for(chunk, values)).collect();

        // 4. Upsert
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }
        let outcome = match self.store.upsert(vectors).await {
            Ok(outcome) => outcome,
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e) => {
                return Ok(Err(IndexingFailure {
                    document_id,
                    stage: IndexingStage::Upsert,
                    message: e.to_string(),
                }));
            }
        };

        let upsert_failures = outcome
            .errors
            .into_iter()
            .map(|e| IndexingFailure {
                document_id: document_id.clone(),
                stage: IndexingStage::Upsert,
                message: format!("vector '{}': {}", e.id, e.message),
            })
            .collect();

        info!(
            document.id = %document_id,
            chunk_count = chunks.len(),
            upserted = outcome.upserted_count,
            "indexed document"
        );
        Ok(Ok(DocOutcome {
            chunks_created: chunks.len(),
            vectors_upserted: outcome.upserted_count,
            upsert_failures,
        }))
    }

    /// Retrieve the chunks most relevant to a query.
    ///
    /// Request options fall back to the configured `top_k` and
    /// `similarity_threshold`. An empty store yields an empty result, not
    /// an error.
    pub async fn retrieve(
        &self,
        query: &str,
        options: &RetrievalOptions,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let query_vector =
            self.embedder.embed_one(query, &EmbeddingOptions::default(), cancel).await?;

        let request = SearchRequest {
            vector: query_vector,
            top_k: options.top_k.unwrap_or(self.config.top_k),
            min_score: options.min_score.unwrap_or(self.config.similarity_threshold),
            filter: options.filter.clone(),
            include_metadata: true,
        };
        let matches = self.store.search(&request).await?;
        let mut chunks: Vec<ScoredChunk> = matches.into_iter().map(chunk_from_match).collect();

        if let Some(reranker) = &self.reranker {
            chunks = reranker.rerank(query, chunks).await?;
        }

        let duration = started.elapsed();
        info!(result_count = chunks.len(), "retrieval completed");

        let mut metadata = Metadata::new();
        metadata.insert("chunk_count".to_string(), chunks.len().into());
        Ok(RetrievalResult { chunks, query: query.to_string(), duration, metadata })
    }

    /// Answer a query grounded in retrieved context.
    ///
    /// Retrieval runs first; one synthesized instruction message carrying
    /// each retrieved chunk (tagged with its provenance) is prepended to
    /// the conversation, the query is appended as the final user message,
    /// and the generation capability produces the answer.
    ///
    /// # Errors
    ///
    /// Provider failures propagate unchanged; [`RagError::Cancelled`] if
    /// `cancel` fires before the response is assembled.
    pub async fn query(
        &self,
        request: RagRequest,
        cancel: &CancellationToken,
    ) -> Result<RagResponse> {
        let started = Instant::now();
        let retrieval = self.retrieve(&request.query, &request.retrieval, cancel).await?;

        let messages = augmented_messages(&retrieval.chunks, &request);
        let generated = tokio::select! {
            _ = cancel.cancelled() => Err(RagError::Cancelled),
            result = self.chat.generate(&messages, &request.generation) => result,
        }?;

        let confidence = mean_score(&retrieval.chunks);
        let citations = build_citations(&retrieval.chunks);
        info!(
            chunk_count = retrieval.chunks.len(),
            confidence,
            model = %generated.model_id,
            "query completed"
        );

        Ok(RagResponse {
            content: generated.content,
            chunks: retrieval.chunks,
            confidence,
            model_id: generated.model_id,
            usage: generated.usage,
            citations,
            duration: started.elapsed(),
        })
    }

    /// Answer a query as a token stream.
    ///
    /// Ordering contract: one [`RagStreamToken::Context`] first (emitted
    /// after retrieval, before any generation call), then each generation
    /// fragment as [`RagStreamToken::Content`] in arrival order with no
    /// buffering, then exactly one terminal [`RagStreamToken::Citation`]
    /// with `is_complete` set. Cancellation ends the stream with
    /// [`RagError::Cancelled`]; tokens already yielded stay delivered and
    /// no `Content` ever follows the `Citation`.
    pub fn stream_query(
        &self,
        request: RagRequest,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<RagStreamToken>> + Send + '_ {
        try_stream! {
            let retrieval = self.retrieve(&request.query, &request.retrieval, &cancel).await?;
            let retrieval_ms = retrieval.duration.as_millis() as u64;
            let citations = build_citations(&retrieval.chunks);
            let messages = augmented_messages(&retrieval.chunks, &request);

            yield RagStreamToken::Context {
                chunk_count: retrieval.chunks.len(),
                retrieval_ms,
            };

            let mut fragments = tokio::select! {
                _ = cancel.cancelled() => Err(RagError::Cancelled),
                result = self.chat.generate_stream(&messages, &request.generation) => result,
            }?;

            loop {
                // yield/? must stay outside the select arms
                let next: Option<Result<String>> = tokio::select! {
                    _ = cancel.cancelled() => Some(Err(RagError::Cancelled)),
                    fragment = fragments.next() => fragment,
                };
                match next {
                    Some(fragment) => {
                        yield RagStreamToken::Content { text: fragment? };
                    }
                    None => break,
                }
            }

            yield RagStreamToken::Citation { citations, is_complete: true };
        }
    }
}

/// Build a self-describing vector for a chunk.
fn vector_for(chunk: &DocumentChunk, values: Vec<f32>) -> Vector {
    let mut metadata = chunk.metadata.clone();
    metadata.insert("document_id".to_string(), chunk.document_id.as_str().into());
    metadata.insert("content".to_string(), chunk.content.as_str().into());
    metadata.insert("chunk_index".to_string(), chunk.chunk_index.into());
    if let Some(title) = &chunk.title {
        metadata.insert("title".to_string(), title.as_str().into());
    }
    if let Some(source) = &chunk.source {
        metadata.insert("source".to_string(), source.as_str().into());
    }
    Vector { id: chunk.id.clone(), values, metadata }
}

/// Rebuild a scored chunk from a search hit's self-describing metadata.
fn chunk_from_match(m: VectorMatch) -> ScoredChunk {
    let mut metadata = m.metadata.unwrap_or_default();
    let document_id = metadata
        .get("document_id")
        .and_then(MetadataValue::as_str)
        .unwrap_or_default()
        .to_string();
    let content = match metadata.remove("content") {
        Some(MetadataValue::Str(s)) => s,
        _ => String::new(),
    };
    let chunk_index =
        metadata.get("chunk_index").and_then(MetadataValue::as_num).unwrap_or(0.0) as usize;
    let title = metadata.get("title").and_then(MetadataValue::as_str).map(str::to_string);
    let source = metadata.get("source").and_then(MetadataValue::as_str).map(str::to_string);

    ScoredChunk {
        chunk: DocumentChunk {
            id: m.id,
            document_id,
            content,
            chunk_index,
            title,
            source,
            metadata,
        },
        score: m.score,
    }
}

/// Mean relevance score; 0.0 for an empty set.
fn mean_score(chunks: &[ScoredChunk]) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }
    chunks.iter().map(|c| c.score).sum::<f32>() / chunks.len() as f32
}

/// One citation per distinct retrieved chunk, in relevance order.
fn build_citations(chunks: &[ScoredChunk]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert(c.chunk.id.clone()))
        .map(|c| Citation {
            document_id: c.chunk.document_id.clone(),
            title: c.chunk.title.clone(),
            url: c.chunk.source.clone(),
            score: c.score,
        })
        .collect()
}

/// Prepend one synthesized instruction message carrying the retrieved
/// context, then the prior conversation, then the query as the final user
/// message.
fn augmented_messages(chunks: &[ScoredChunk], request: &RagRequest) -> Vec<Message> {
    let mut messages = Vec::with_capacity(request.messages.len() + 2);

    if !chunks.is_empty() {
        let mut context = String::from(
            "Use the following retrieved context to answer. \
             Cite sources where relevant.\n",
        );
        for scored in chunks {
            let provenance = scored
                .chunk
                .source
                .as_deref()
                .or(scored.chunk.title.as_deref())
                .unwrap_or(&scored.chunk.document_id);
            context.push_str(&format!("\n[source: {provenance}]\n{}\n", scored.chunk.content));
        }
        messages.push(Message::system(context));
    }

    messages.extend(request.messages.iter().cloned());
    messages.push(Message::user(request.query.clone()));
    messages
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider`, `vector_store`, and `chat_model` are required.
/// The chunker defaults to a [`FixedSizeChunker`] sized from the config;
/// the reranker is optional.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chat_model: Option<Arc<dyn ChatModel>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the generation backend.
    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.chat_model = Some(model);
        self
    }

    /// Set the document chunker. Defaults to a fixed-size chunker sized
    /// from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set an optional reranker for post-search result reordering.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let chat_model = self
            .chat_model
            .ok_or_else(|| RagError::Config("chat_model is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(RagPipeline {
            embedder: BatchEmbedder::new(embedding_provider, config.embed_batch_size),
            config,
            processor: DocumentProcessor::new(),
            chunker,
            store: vector_store,
            chat: chat_model,
            reranker: self.reranker,
        })
    }
}
