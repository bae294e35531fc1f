//! Error types for the `ragline` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid caller-supplied input or parameters.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during text generation.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generation backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's length disagrees with the store's established dimension.
    ///
    /// During upsert these are collected per-vector into
    /// [`UpsertOutcome::errors`](crate::vectorstore::UpsertOutcome) rather
    /// than aborting the batch.
    #[error("Dimension mismatch for vector '{id}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The id of the offending vector.
        id: String,
        /// The dimension the store has adopted.
        expected: usize,
        /// The length of the rejected vector.
        actual: usize,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// The operation was aborted by the caller's cancellation signal.
    ///
    /// Distinct from a failure: no partial result accompanies it.
    #[error("Operation cancelled")]
    Cancelled,
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
