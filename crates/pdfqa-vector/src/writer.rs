use std::collections::HashMap;

use pdfqa_core::error::{Error, Result};
use pdfqa_core::types::{Chunk, ChunkId, DocumentId};

use crate::schema::{content_hash, VectorEntry};
use crate::DenseIndex;

/// A vector computed for a chunk but not yet visible to searches.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedVector {
	pub chunk_id: ChunkId,
	pub document_id: DocumentId,
	pub content_hash: String,
	pub vector: Vec<f32>,
}

impl DenseIndex {
	/// Embed `chunks` without touching the index.
	///
	/// Chunks whose text hash matches a stored entry reuse that vector. Any embedding
	/// failure or dimension mismatch fails the whole batch, so a document is either
	/// fully prepared or not at all.
	pub fn prepare(&self, chunks: &[Chunk]) -> Result<Vec<PreparedVector>> {
		let known: HashMap<String, Vec<f32>> = {
			let store = self.read();
			chunks
				.iter()
				.filter_map(|c| store.entries.get(&c.chunk_id))
				.map(|e| (e.content_hash.clone(), e.vector.clone()))
				.collect()
		};

		let mut prepared = Vec::with_capacity(chunks.len());
		let mut reused = 0usize;
		for chunk in chunks {
			let hash = content_hash(&chunk.text);
			let vector = match known.get(&hash) {
				Some(v) => { reused += 1; v.clone() }
				None => self.embedder.embed(&chunk.text).map_err(|e| Error::ingest(&chunk.document_id, format!("embedding chunk {} failed: {e:#}", chunk.chunk_id)))?,
			};
			if vector.len() != self.dimension {
				return Err(Error::ingest(&chunk.document_id, format!("embedder returned {} dims for chunk {}, index expects {}", vector.len(), chunk.chunk_id, self.dimension)));
			}
			prepared.push(PreparedVector { chunk_id: chunk.chunk_id.clone(), document_id: chunk.document_id.clone(), content_hash: hash, vector });
		}
		tracing::debug!(chunks = chunks.len(), reused, "dense vectors prepared");
		Ok(prepared)
	}

	/// Swap in the prepared vectors of `document_id`, dropping its previous entries.
	pub fn commit_document(&self, document_id: &str, prepared: Vec<PreparedVector>) {
		let mut store = self.write();
		store.remove_document(document_id);
		for p in prepared {
			let seq = store.next_seq;
			store.next_seq += 1;
			store.entries.insert(p.chunk_id.clone(), VectorEntry { chunk_id: p.chunk_id, document_id: p.document_id, seq, content_hash: p.content_hash, vector: p.vector });
		}
	}

	/// Embed and store a single chunk, replacing any entry with the same id.
	pub fn upsert(&self, chunk: &Chunk) -> Result<()> {
		let Some(p) = self.prepare(std::slice::from_ref(chunk))?.pop() else { return Ok(()) };
		let mut store = self.write();
		let seq = match store.entries.get(&p.chunk_id) {
			Some(existing) => existing.seq,
			None => { let s = store.next_seq; store.next_seq += 1; s }
		};
		store.entries.insert(p.chunk_id.clone(), VectorEntry { chunk_id: p.chunk_id, document_id: p.document_id, seq, content_hash: p.content_hash, vector: p.vector });
		Ok(())
	}

	/// Drop every vector of `document_id`; returns how many were removed.
	pub fn remove(&self, document_id: &str) -> usize { self.write().remove_document(document_id) }
}
