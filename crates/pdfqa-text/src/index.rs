use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tantivy::tokenizer::TextAnalyzer;

use pdfqa_core::error::{Error, Result};
use pdfqa_core::types::{Chunk, ChunkId, DocumentId, RetrievalResult, SourceKind};

use crate::search::{bm25_rank, Bm25Params};
use crate::tantivy_utils::{analyze, build_analyzer};

/// One entry of a term's postings list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
	pub chunk_id: ChunkId,
	pub term_frequency: u32,
}

/// Per-chunk bookkeeping: owning document, insertion sequence and term count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedChunk {
	pub document_id: DocumentId,
	pub seq: u64,
	pub length: u32,
}

/// Inverted mapping `term -> postings` plus the length statistics BM25 needs.
///
/// Serializable as-is; this is the sparse half of an engine snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvertedIndex {
	pub postings: BTreeMap<String, Vec<Posting>>,
	pub chunks: BTreeMap<ChunkId, IndexedChunk>,
	pub next_seq: u64,
	pub total_length: u64,
}

impl InvertedIndex {
	pub fn new() -> Self { Self::default() }

	pub fn len(&self) -> usize { self.chunks.len() }

	pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

	/// Index `terms` under `chunk_id`, replacing any previous entry for that id.
	pub fn add(&mut self, chunk_id: &str, document_id: &str, terms: &[String]) {
		self.remove_chunk(chunk_id);
		let mut tf: HashMap<&str, u32> = HashMap::new();
		for term in terms { *tf.entry(term.as_str()).or_insert(0) += 1; }
		for (term, term_frequency) in tf {
			self.postings.entry(term.to_string()).or_default().push(Posting { chunk_id: chunk_id.to_string(), term_frequency });
		}
		let length = terms.len() as u32;
		self.chunks.insert(chunk_id.to_string(), IndexedChunk { document_id: document_id.to_string(), seq: self.next_seq, length });
		self.next_seq += 1;
		self.total_length += u64::from(length);
	}

	pub fn remove_chunk(&mut self, chunk_id: &str) -> bool {
		let Some(entry) = self.chunks.remove(chunk_id) else { return false };
		self.total_length -= u64::from(entry.length);
		self.postings.retain(|_, postings| {
			postings.retain(|p| p.chunk_id != chunk_id);
			!postings.is_empty()
		});
		true
	}

	/// Drop every chunk of `document_id`; returns how many were removed.
	pub fn remove_document(&mut self, document_id: &str) -> usize {
		let doomed: Vec<ChunkId> = self.chunks.iter().filter(|(_, c)| c.document_id == document_id).map(|(id, _)| id.clone()).collect();
		if doomed.is_empty() { return 0; }
		for id in &doomed {
			if let Some(entry) = self.chunks.remove(id) { self.total_length -= u64::from(entry.length); }
		}
		self.postings.retain(|_, postings| {
			postings.retain(|p| !doomed.contains(&p.chunk_id));
			!postings.is_empty()
		});
		doomed.len()
	}

	pub fn average_length(&self) -> f32 {
		if self.chunks.is_empty() { return 0.0; }
		self.total_length as f32 / self.chunks.len() as f32
	}

	/// Structural checks used when a snapshot is restored.
	pub fn validate(&self) -> Result<()> {
		let total: u64 = self.chunks.values().map(|c| u64::from(c.length)).sum();
		if total != self.total_length {
			return Err(Error::Index(format!("sparse total_length {} disagrees with chunk lengths {}", self.total_length, total)));
		}
		if let Some(max_seq) = self.chunks.values().map(|c| c.seq).max() {
			if max_seq >= self.next_seq { return Err(Error::Index("sparse next_seq is behind stored sequences".into())); }
		}
		for (term, postings) in &self.postings {
			if let Some(p) = postings.iter().find(|p| !self.chunks.contains_key(&p.chunk_id)) {
				return Err(Error::Index(format!("posting for '{}' references unknown chunk {}", term, p.chunk_id)));
			}
		}
		Ok(())
	}
}

/// Thread-safe BM25 index over chunk text.
///
/// Readers share the lock; `upsert_document` and `remove` take it exclusively,
/// so a search never observes a half-updated postings list.
pub struct SparseIndex {
	analyzer: TextAnalyzer,
	params: Bm25Params,
	inner: RwLock<InvertedIndex>,
}

impl SparseIndex {
	pub fn new(params: Bm25Params) -> Self {
		Self { analyzer: build_analyzer(), params, inner: RwLock::new(InvertedIndex::new()) }
	}

	/// Restore from a snapshot after checking it is internally consistent.
	pub fn from_snapshot(params: Bm25Params, index: InvertedIndex) -> Result<Self> {
		index.validate()?;
		Ok(Self { analyzer: build_analyzer(), params, inner: RwLock::new(index) })
	}

	pub fn analyze(&self, text: &str) -> Vec<String> { analyze(&self.analyzer, text) }

	pub fn upsert(&self, chunk: &Chunk) {
		let terms = self.analyze(&chunk.text);
		self.write().add(&chunk.chunk_id, &chunk.document_id, &terms);
	}

	/// Replace everything indexed for `document_id` with `chunks` in one step.
	pub fn upsert_document(&self, document_id: &str, chunks: &[Chunk]) {
		let analyzed: Vec<Vec<String>> = chunks.iter().map(|c| self.analyze(&c.text)).collect();
		let mut inner = self.write();
		inner.remove_document(document_id);
		for (chunk, terms) in chunks.iter().zip(&analyzed) { inner.add(&chunk.chunk_id, document_id, terms); }
	}

	pub fn remove(&self, document_id: &str) -> usize { self.write().remove_document(document_id) }

	/// Top `k` chunks by BM25. A query with no surviving terms returns nothing.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
		if k == 0 { return Err(Error::Query("k must be >= 1".into())); }
		let terms = self.analyze(query);
		if terms.is_empty() { return Ok(Vec::new()); }
		let ranked = bm25_rank(&self.read(), &terms, &self.params, k);
		tracing::debug!(terms = terms.len(), hits = ranked.len(), "sparse search");
		Ok(RetrievalResult::ranked(ranked, SourceKind::Sparse))
	}

	pub fn len(&self) -> usize { self.read().len() }

	pub fn is_empty(&self) -> bool { self.read().is_empty() }

	pub fn snapshot(&self) -> InvertedIndex { self.read().clone() }

	fn read(&self) -> std::sync::RwLockReadGuard<'_, InvertedIndex> { self.inner.read().unwrap_or_else(PoisonError::into_inner) }

	fn write(&self) -> std::sync::RwLockWriteGuard<'_, InvertedIndex> { self.inner.write().unwrap_or_else(PoisonError::into_inner) }
}
