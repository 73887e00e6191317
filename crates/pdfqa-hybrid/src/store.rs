//! Canonical chunk store and document catalogue. Both indexes refer to chunks by id only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pdfqa_core::types::{Chunk, ChunkId, Document, DocumentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub filename: String,
    pub title: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub added_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn describe(document: &Document, chunk_count: usize) -> Self {
        Self {
            id: document.id.clone(),
            filename: document.filename.clone(),
            title: document.display_title().to_string(),
            page_count: document.pages.len(),
            chunk_count,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChunkStore {
    documents: BTreeMap<DocumentId, DocumentRecord>,
    chunks: BTreeMap<ChunkId, Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from snapshot parts; callers validate consistency first.
    pub fn from_parts(documents: Vec<DocumentRecord>, chunks: Vec<Chunk>) -> Self {
        Self {
            documents: documents.into_iter().map(|d| (d.id.clone(), d)).collect(),
            chunks: chunks.into_iter().map(|c| (c.chunk_id.clone(), c)).collect(),
        }
    }

    /// Replace whatever was stored for `record.id`.
    pub fn insert(&mut self, record: DocumentRecord, chunks: Vec<Chunk>) {
        self.remove(&record.id);
        for chunk in chunks {
            self.chunks.insert(chunk.chunk_id.clone(), chunk);
        }
        self.documents.insert(record.id.clone(), record);
    }

    pub fn remove(&mut self, document_id: &str) -> Option<DocumentRecord> {
        let record = self.documents.remove(document_id)?;
        self.chunks.retain(|_, c| c.document_id != document_id);
        Some(record)
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<&Chunk> {
        self.chunks.get(chunk_id)
    }

    pub fn document(&self, document_id: &str) -> Option<&DocumentRecord> {
        self.documents.get(document_id)
    }

    /// Chunks of one document in reading order.
    pub fn document_chunks(&self, document_id: &str) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self.chunks.values().filter(|c| c.document_id == document_id).collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.values()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Document text rebuilt from its chunks with the overlap removed; pages separated by a blank line.
pub fn reassemble(chunks: &[&Chunk]) -> String {
    let mut out = String::new();
    let mut page = None;
    for chunk in chunks {
        if page != Some(chunk.page_number) {
            if page.is_some() {
                out.push_str("\n\n");
            }
            page = Some(chunk.page_number);
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(chunk.overlap_with_previous));
        }
    }
    out
}
