//! Data types for documents, chunks, and retrieval results.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A closed tagged value for document and vector metadata.
///
/// Keeps metadata serializable and comparable without reflection: filters
/// compare variants with derived equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A string value.
    Str(String),
    /// A numeric value.
    Num(f64),
    /// A boolean value.
    Bool(bool),
    /// A list of strings (e.g. tags).
    List(Vec<String>),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Str(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Num(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Num(v as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(v: Vec<String>) -> Self {
        MetadataValue::List(v)
    }
}

impl MetadataValue {
    /// Return the string content if this is a `Str` variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Return the numeric content if this is a `Num` variant.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            MetadataValue::Num(n) => Some(*n),
            _ => None,
        }
    }
}

/// A metadata map keyed by field name.
pub type Metadata = HashMap<String, MetadataValue>;

/// A raw document submitted for indexing. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentInput {
    /// The raw text content (possibly HTML, see `mime_type`).
    pub content: String,
    /// Optional stable identifier. Generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Optional document title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional author name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Optional tags, copied into the processed document's metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Optional mime type; HTML-like types trigger markup stripping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Arbitrary caller-supplied metadata, passed through unchanged.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

impl DocumentInput {
    /// Create a plain-text document input with the given content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            id: None,
            title: None,
            author: None,
            tags: Vec::new(),
            source_url: None,
            mime_type: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the source URL.
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Set the mime type.
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Add tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Insert a caller-supplied metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A normalized document ready for chunking. Produced once per indexing
/// call and not mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedDocument {
    /// Unique identifier for the document.
    pub id: String,
    /// The normalized text content.
    pub content: String,
    /// Optional document title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Size metadata plus caller-supplied entries.
    pub metadata: Metadata,
}

/// A segment of a [`ProcessedDocument`] addressable for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// Unique identifier, stable for the chunk's lifetime.
    pub id: String,
    /// The id of the owning [`ProcessedDocument`].
    pub document_id: String,
    /// The text content of this chunk.
    pub content: String,
    /// 0-based position among this document's chunks; contiguous per document.
    pub chunk_index: usize,
    /// Optional title inherited from the owning document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional source identifier inherited from the owning document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// A by-value copy of the owning document's metadata.
    pub metadata: Metadata,
}

/// A retrieved [`DocumentChunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: DocumentChunk,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}

/// The outcome of a retrieval call, best match first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Retrieved chunks ordered by descending relevance.
    pub chunks: Vec<ScoredChunk>,
    /// The original query text.
    pub query: String,
    /// Wall-clock time spent on retrieval.
    pub duration: Duration,
    /// Free-form metadata about the retrieval.
    pub metadata: Metadata,
}
