//! Document normalization and chunking strategies.
//!
//! This module provides the [`DocumentProcessor`] for turning raw input into
//! a normalized [`ProcessedDocument`], and the [`Chunker`] trait with two
//! implementations:
//!
//! - [`FixedSizeChunker`] — splits by character count with configurable overlap
//! - [`ParagraphChunker`] — packs whole paragraphs up to a size limit

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::document::{DocumentChunk, DocumentInput, MetadataValue, ProcessedDocument};
use crate::error::{RagError, Result};

/// Matches any markup element delimited by `<...>`.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Matches runs of 3+ whitespace characters left behind by tag removal.
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{3,}").unwrap());

/// Matches blank-line paragraph boundaries.
static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// Normalizes raw document input into a [`ProcessedDocument`].
///
/// Strips markup for HTML-like mime types, computes size metadata, and
/// passes caller-supplied tags and source URL through unchanged. The
/// processed document is produced once per indexing call and never mutated
/// afterward.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    /// Create a new `DocumentProcessor`.
    pub fn new() -> Self {
        Self
    }

    /// Normalize a raw [`DocumentInput`].
    ///
    /// If the input declares an HTML-like mime type, all `<...>` elements
    /// are removed and runs of 3+ whitespace characters collapse to a
    /// single space. Whitespace-only content is valid and yields a
    /// zero-chunk document downstream.
    pub fn process(&self, input: DocumentInput) -> ProcessedDocument {
        let content = if is_html_like(input.mime_type.as_deref()) {
            strip_markup(&input.content)
        } else {
            input.content
        };

        let mut metadata = input.metadata;
        metadata.insert("char_count".to_string(), content.chars().count().into());
        metadata.insert("word_count".to_string(), content.split_whitespace().count().into());
        metadata.insert("line_count".to_string(), content.lines().count().into());
        if !input.tags.is_empty() {
            metadata.insert("tags".to_string(), MetadataValue::List(input.tags));
        }
        if let Some(url) = &input.source_url {
            metadata.insert("source_url".to_string(), url.as_str().into());
        }
        if let Some(author) = &input.author {
            metadata.insert("author".to_string(), author.as_str().into());
        }

        let id = input.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        debug!(document.id = %id, chars = content.chars().count(), "processed document");

        ProcessedDocument {
            id,
            content,
            title: input.title,
            source_url: input.source_url,
            metadata,
        }
    }
}

/// True for mime types that declare HTML-like markup.
fn is_html_like(mime_type: Option<&str>) -> bool {
    mime_type.is_some_and(|m| {
        let m = m.to_ascii_lowercase();
        m.contains("html") || m.contains("xml")
    })
}

/// Remove `<...>` elements and collapse runs of 3+ whitespace to one space.
fn strip_markup(content: &str) -> String {
    let stripped = TAG_RE.replace_all(content, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// A strategy for splitting processed documents into chunks.
///
/// Implementations produce [`DocumentChunk`]s in content order with
/// contiguous `chunk_index` values starting at 0. Each chunk carries a
/// by-value copy of the document's metadata.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    ///
    /// Returns an empty `Vec` for empty or whitespace-only content.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the strategy's parameters are
    /// invalid (e.g. zero chunk size, or overlap >= chunk size).
    fn chunk(&self, document: &ProcessedDocument) -> Result<Vec<DocumentChunk>>;
}

/// Build a chunk at `chunk_index` inheriting the document's metadata.
fn make_chunk(document: &ProcessedDocument, chunk_index: usize, content: String) -> DocumentChunk {
    DocumentChunk {
        id: format!("{}_{chunk_index}", document.id),
        document_id: document.id.clone(),
        content,
        chunk_index,
        title: document.title.clone(),
        source: document.source_url.clone(),
        metadata: document.metadata.clone(),
    }
}

/// Splits text into fixed-size character windows with configurable overlap.
///
/// Windows are `chunk_size` characters long and advance by
/// `chunk_size - overlap` characters; the final window may be shorter.
/// A non-empty document always yields at least its first window, even
/// when its content is no longer than the overlap. Positions are measured
/// in characters, not bytes, so multi-byte text never splits a code point.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(512, 100);
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — number of characters per window
    /// * `overlap` — characters shared between consecutive windows
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be less than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &ProcessedDocument) -> Result<Vec<DocumentChunk>> {
        self.validate()?;

        if document.content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let chars: Vec<char> = document.content.chars().collect();
        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let content: String = chars[start..end].iter().collect();
            chunks.push(make_chunk(document, chunk_index, content));
            chunk_index += 1;
            // A window reaching the end covers the rest; a further window
            // would contain only overlap already emitted.
            if end == chars.len() {
                break;
            }
            start += step;
        }

        debug!(document.id = %document.id, chunk_count = chunks.len(), "fixed-size chunking");
        Ok(chunks)
    }
}

/// Packs whole paragraphs into chunks up to a size limit.
///
/// Content splits on blank-line boundaries; consecutive paragraphs are
/// concatenated into a growing chunk until adding the next would exceed
/// `chunk_size`, at which point the chunk closes and a new one starts with
/// that paragraph. A single paragraph longer than `chunk_size` becomes its
/// own oversized chunk rather than being truncated.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    chunk_size: usize,
}

impl ParagraphChunker {
    /// Create a new `ParagraphChunker` with the given size limit in characters.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, document: &ProcessedDocument) -> Result<Vec<DocumentChunk>> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }

        if document.content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let paragraphs: Vec<&str> = PARAGRAPH_RE
            .split(&document.content)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut chunk_index = 0;

        for paragraph in paragraphs {
            if current.is_empty() {
                current = paragraph.to_string();
                continue;
            }
            // +2 accounts for the blank-line separator between paragraphs
            if current.chars().count() + 2 + paragraph.chars().count() <= self.chunk_size {
                current.push_str("\n\n");
                current.push_str(paragraph);
            } else {
                chunks.push(make_chunk(document, chunk_index, current));
                chunk_index += 1;
                current = paragraph.to_string();
            }
        }
        if !current.is_empty() {
            chunks.push(make_chunk(document, chunk_index, current));
        }

        debug!(document.id = %document.id, chunk_count = chunks.len(), "paragraph chunking");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn doc(content: &str) -> ProcessedDocument {
        ProcessedDocument {
            id: "doc_1".to_string(),
            content: content.to_string(),
            title: None,
            source_url: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn strips_html_markup() {
        let processor = DocumentProcessor::new();
        let input = DocumentInput::new("<html><body><p>Hello</p>   <p>world</p></body></html>")
            .with_mime_type("text/html");
        let processed = processor.process(input);
        assert_eq!(processed.content, "Hello world");
    }

    #[test]
    fn plain_text_passes_through() {
        let processor = DocumentProcessor::new();
        let processed = processor.process(DocumentInput::new("line one\nline two"));
        assert_eq!(processed.content, "line one\nline two");
        assert_eq!(processed.metadata["line_count"].as_num(), Some(2.0));
        assert_eq!(processed.metadata["word_count"].as_num(), Some(4.0));
    }

    #[test]
    fn fixed_size_window_offsets() {
        // 32 chars, chunk_size 10, overlap 2 → windows at 0, 8, 16, 24
        let document = doc("aaaaaaaaaa bbbbbbbbbb cccccccccc");
        let chunks = FixedSizeChunker::new(10, 2).chunk(&document).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].content, "aaaaaaaaaa");
        assert_eq!(chunks[1].content, "aa bbbbbbb");
        assert_eq!(chunks[2].content, "bbb cccccc");
        assert_eq!(chunks[3].content, "cccc");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.id, format!("doc_1_{i}"));
        }
    }

    #[test]
    fn fixed_size_rejects_bad_overlap() {
        let document = doc("some content");
        assert!(matches!(
            FixedSizeChunker::new(10, 10).chunk(&document),
            Err(RagError::Config(_))
        ));
        assert!(matches!(FixedSizeChunker::new(0, 0).chunk(&document), Err(RagError::Config(_))));
    }

    #[test]
    fn whitespace_only_yields_no_chunks() {
        let document = doc("   \n\t  ");
        assert!(FixedSizeChunker::new(10, 0).chunk(&document).unwrap().is_empty());
        assert!(ParagraphChunker::new(10).chunk(&document).unwrap().is_empty());
    }

    #[test]
    fn paragraphs_pack_up_to_limit() {
        let document = doc("alpha\n\nbeta\n\ngamma");
        let chunks = ParagraphChunker::new(12).chunk(&document).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "alpha\n\nbeta");
        assert_eq!(chunks[1].content, "gamma");
    }

    #[test]
    fn oversized_paragraph_is_kept_whole() {
        let document = doc("short\n\nthis paragraph is far longer than the limit\n\nend");
        let chunks = ParagraphChunker::new(10).chunk(&document).unwrap();
        assert!(chunks.iter().any(|c| c.content.len() > 10));
        assert_eq!(chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn chunks_copy_document_metadata() {
        let mut document = doc("hello world, enough text to chunk");
        document.metadata.insert("category".to_string(), "test".into());
        let chunks = FixedSizeChunker::new(10, 0).chunk(&document).unwrap();
        assert!(chunks.iter().all(|c| c.metadata["category"].as_str() == Some("test")));
    }

    #[test]
    fn multibyte_content_never_splits_code_points() {
        let document = doc("héllo wörld — ünïcode cöntent höre");
        let chunks = FixedSizeChunker::new(7, 2).chunk(&document).unwrap();
        assert!(!chunks.is_empty());
        let glued: String = chunks[0].content.chars().take(5).collect();
        assert_eq!(glued, "héllo");
    }
}
