//! In-memory dense index: one L2-comparable vector per chunk, searched by cosine similarity.
//!
//! The embedder is fixed at construction and its id/dimension are recorded in every
//! snapshot, so vectors from a different model are never mixed into one index.
//! Readers share an `RwLock`; writers take it only for the final swap, after all
//! embeddings of a document have been computed (`prepare` then `commit_document`).

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pdfqa_core::error::{Error, Result};
use pdfqa_core::traits::Embedder;
use pdfqa_core::types::{ChunkId, RetrievalResult, SourceKind};

pub mod schema;
pub mod search;
pub mod writer;

pub use schema::{content_hash, DenseSnapshot, VectorEntry};
pub use writer::PreparedVector;

#[derive(Debug, Default)]
struct VectorStore {
	entries: BTreeMap<ChunkId, VectorEntry>,
	next_seq: u64,
}

impl VectorStore {
	fn remove_document(&mut self, document_id: &str) -> usize {
		let before = self.entries.len();
		self.entries.retain(|_, e| e.document_id != document_id);
		before - self.entries.len()
	}
}

pub struct DenseIndex {
	embedder: Arc<dyn Embedder>,
	dimension: usize,
	inner: RwLock<VectorStore>,
}

impl DenseIndex {
	pub fn new(embedder: Arc<dyn Embedder>) -> Self {
		let dimension = embedder.dim();
		Self { embedder, dimension, inner: RwLock::new(VectorStore::default()) }
	}

	/// Restore a snapshot, refusing one produced by another model or with bad vectors.
	pub fn from_snapshot(embedder: Arc<dyn Embedder>, snapshot: DenseSnapshot) -> Result<Self> {
		if snapshot.embedder_id != embedder.id() {
			return Err(Error::Index(format!("snapshot embedder '{}' differs from configured '{}'", snapshot.embedder_id, embedder.id())));
		}
		if snapshot.dimension != embedder.dim() {
			return Err(Error::Index(format!("snapshot dimension {} differs from embedder dimension {}", snapshot.dimension, embedder.dim())));
		}
		let mut store = VectorStore { entries: BTreeMap::new(), next_seq: snapshot.next_seq };
		for entry in snapshot.entries {
			if entry.vector.len() != snapshot.dimension {
				return Err(Error::Index(format!("vector for {} has {} dims", entry.chunk_id, entry.vector.len())));
			}
			if entry.seq >= snapshot.next_seq {
				return Err(Error::Index(format!("vector for {} has sequence beyond next_seq", entry.chunk_id)));
			}
			if store.entries.insert(entry.chunk_id.clone(), entry).is_some() {
				return Err(Error::Index("duplicate chunk id in dense snapshot".into()));
			}
		}
		let dimension = snapshot.dimension;
		Ok(Self { embedder, dimension, inner: RwLock::new(store) })
	}

	pub fn embedder_id(&self) -> &str { self.embedder.id() }

	pub fn dimension(&self) -> usize { self.dimension }

	pub fn len(&self) -> usize { self.read().entries.len() }

	pub fn is_empty(&self) -> bool { self.read().entries.is_empty() }

	pub fn contains(&self, chunk_id: &str) -> bool { self.read().entries.contains_key(chunk_id) }

	/// Top `k` chunks by cosine similarity to the embedded query.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
		if k == 0 { return Err(Error::Query("k must be >= 1".into())); }
		let q = self.embedder.embed(query).map_err(|e| Error::Query(format!("embedding query failed: {e:#}")))?;
		if q.len() != self.dimension {
			return Err(Error::Query(format!("query embedding has {} dims, index expects {}", q.len(), self.dimension)));
		}
		let ranked = search::top_k(self.read().entries.values(), &q, k);
		tracing::debug!(hits = ranked.len(), "dense search");
		Ok(RetrievalResult::ranked(ranked, SourceKind::Dense))
	}

	pub fn snapshot(&self) -> DenseSnapshot {
		let store = self.read();
		let mut entries: Vec<VectorEntry> = store.entries.values().cloned().collect();
		entries.sort_by_key(|e| e.seq);
		DenseSnapshot { embedder_id: self.embedder.id().to_string(), dimension: self.dimension, next_seq: store.next_seq, entries }
	}

	fn read(&self) -> RwLockReadGuard<'_, VectorStore> { self.inner.read().unwrap_or_else(PoisonError::into_inner) }

	fn write(&self) -> RwLockWriteGuard<'_, VectorStore> { self.inner.write().unwrap_or_else(PoisonError::into_inner) }
}
