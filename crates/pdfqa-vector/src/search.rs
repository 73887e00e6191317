use std::cmp::Ordering;

use pdfqa_core::types::ChunkId;

use crate::schema::VectorEntry;

/// Cosine similarity; 0 when either side has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		na += x * x;
		nb += y * y;
	}
	if na == 0.0 || nb == 0.0 { return 0.0; }
	dot / (na.sqrt() * nb.sqrt())
}

/// Exhaustive nearest-neighbour scan: descending similarity, then insertion order, then id.
pub fn top_k<'a, I>(entries: I, query: &[f32], k: usize) -> Vec<(ChunkId, f32)>
where
	I: IntoIterator<Item = &'a VectorEntry>,
{
	let mut scored: Vec<(&VectorEntry, f32)> = entries.into_iter().map(|e| (e, cosine(&e.vector, query))).collect();
	scored.sort_by(|a, b| {
		b.1.partial_cmp(&a.1)
			.unwrap_or(Ordering::Equal)
			.then(a.0.seq.cmp(&b.0.seq))
			.then_with(|| a.0.chunk_id.cmp(&b.0.chunk_id))
	});
	scored.truncate(k);
	scored.into_iter().map(|(e, s)| (e.chunk_id.clone(), s)).collect()
}
