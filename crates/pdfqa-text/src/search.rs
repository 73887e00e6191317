use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pdfqa_core::config::RetrievalConfig;
use pdfqa_core::types::ChunkId;

use crate::index::InvertedIndex;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
}

impl Default for Bm25Params {
	fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

impl From<&RetrievalConfig> for Bm25Params {
	fn from(cfg: &RetrievalConfig) -> Self { Self { k1: cfg.bm25_k1, b: cfg.bm25_b } }
}

/// BM25 Okapi over already-normalized query terms.
///
/// Returns at most `k` `(chunk_id, score)` pairs ordered by descending score,
/// ties broken by insertion order and then by chunk id.
pub fn bm25_rank(index: &InvertedIndex, terms: &[String], params: &Bm25Params, k: usize) -> Vec<(ChunkId, f32)> {
	if terms.is_empty() || index.is_empty() { return Vec::new(); }
	let n = index.len() as f32;
	let avgdl = index.average_length();

	let mut scores: HashMap<&str, f32> = HashMap::new();
	for term in terms {
		let Some(postings) = index.postings.get(term) else { continue };
		let df = postings.len() as f32;
		// IDF: ln((N - df + 0.5) / (df + 0.5) + 1), always positive
		let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
		for posting in postings {
			let dl = index.chunks.get(&posting.chunk_id).map_or(0.0, |c| c.length as f32);
			let tf = posting.term_frequency as f32;
			let norm = if avgdl > 0.0 { dl / avgdl } else { 0.0 };
			let tf_part = (tf * (params.k1 + 1.0)) / (tf + params.k1 * (1.0 - params.b + params.b * norm));
			*scores.entry(posting.chunk_id.as_str()).or_insert(0.0) += idf * tf_part;
		}
	}

	let mut ranked: Vec<(&str, f32, u64)> = scores
		.into_iter()
		.map(|(id, score)| (id, score, index.chunks.get(id).map_or(u64::MAX, |c| c.seq)))
		.collect();
	ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.2.cmp(&b.2)).then_with(|| a.0.cmp(b.0)));
	ranked.truncate(k);
	ranked.into_iter().map(|(id, score, _)| (id.to_string(), score)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn corpus(docs: &[(&str, &str)]) -> InvertedIndex {
		let mut idx = InvertedIndex::new();
		for (id, text) in docs {
			let terms: Vec<String> = text.split_whitespace().map(str::to_string).collect();
			idx.add(id, "d", &terms);
		}
		idx
	}

	fn q(s: &str) -> Vec<String> { s.split_whitespace().map(str::to_string).collect() }

	#[test]
	fn higher_term_frequency_ranks_first() {
		let idx = corpus(&[("a", "rust programming"), ("b", "rust rust rust")]);
		let hits = bm25_rank(&idx, &q("rust"), &Bm25Params::default(), 10);
		assert_eq!(hits[0].0, "b");
		assert!(hits[0].1 > hits[1].1);
	}

	#[test]
	fn ties_follow_insertion_order() {
		let idx = corpus(&[("z", "apple pie"), ("a", "apple pie"), ("m", "apple pie")]);
		let hits = bm25_rank(&idx, &q("apple"), &Bm25Params::default(), 10);
		let ids: Vec<&str> = hits.iter().map(|h| h.0.as_str()).collect();
		assert_eq!(ids, vec!["z", "a", "m"]);
	}

	#[test]
	fn truncates_to_k_and_ignores_unknown_terms() {
		let idx = corpus(&[("a", "x y"), ("b", "x"), ("c", "x z")]);
		assert_eq!(bm25_rank(&idx, &q("x"), &Bm25Params::default(), 2).len(), 2);
		assert!(bm25_rank(&idx, &q("nothing"), &Bm25Params::default(), 5).is_empty());
	}
}
