use serde::{Deserialize, Serialize};

use pdfqa_core::types::{ChunkId, DocumentId};

/// One stored vector. `seq` is the global insertion order used for tie-breaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
	pub chunk_id: ChunkId,
	pub document_id: DocumentId,
	pub seq: u64,
	pub content_hash: String,
	pub vector: Vec<f32>,
}

/// Serializable form of a dense index, tagged with the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseSnapshot {
	pub embedder_id: String,
	pub dimension: usize,
	pub next_seq: u64,
	pub entries: Vec<VectorEntry>,
}

/// blake3 hex digest of chunk text; equal hashes mean the vector can be reused.
pub fn content_hash(text: &str) -> String {
	blake3::hash(text.as_bytes()).to_hex().to_string()
}
