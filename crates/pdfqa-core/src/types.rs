//! Domain types shared by the chunker, both indexes and the answer engine.

use serde::{Deserialize, Serialize};

pub type DocumentId = String;
pub type ChunkId = String;

/// One page of extracted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// A source document as handed over by the extraction pipeline.
///
/// - `id`: stable document identity chosen by the caller
/// - `filename`: original file name, used in citations
/// - `title`: optional human title (falls back to `filename`)
/// - `pages`: pages in reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    #[serde(default)]
    pub title: Option<String>,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().filter(|t| !t.trim().is_empty()).unwrap_or(&self.filename)
    }

    /// True when no page carries any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

/// A bounded span of one page of one document; the unit of retrieval.
///
/// Offsets and `overlap_with_previous` are measured in characters
/// (Unicode scalar values) of the page text. `chunk_index` is the position
/// of the chunk within its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub page_number: u32,
    pub start_offset: usize,
    pub end_offset: usize,
    pub overlap_with_previous: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// Indicates which strategy produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Dense,
    Sparse,
    Fused,
}

/// A ranked hit returned by either index or by fusion.
///
/// `score` is strategy-specific but higher is always better. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub rank: usize,
    pub source: SourceKind,
}

impl RetrievalResult {
    /// Assign 1-based ranks to an already ordered list of `(chunk_id, score)`.
    pub fn ranked(scored: Vec<(ChunkId, f32)>, source: SourceKind) -> Vec<Self> {
        scored
            .into_iter()
            .enumerate()
            .map(|(i, (chunk_id, score))| Self { chunk_id, score, rank: i + 1, source })
            .collect()
    }
}

/// A pointer from an answer back to the passage that supports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub marker: usize,
    pub document_id: DocumentId,
    pub filename: String,
    pub page_number: u32,
    pub chunk_id: ChunkId,
    pub excerpt: String,
}

/// Caller-tunable knobs of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub k: usize,
    pub dense_weight: f32,
    pub sparse_weight: f32,
}
