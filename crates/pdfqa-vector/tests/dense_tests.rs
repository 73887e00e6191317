use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pdfqa_core::error::Error;
use pdfqa_core::traits::Embedder;
use pdfqa_core::types::{Chunk, SourceKind};
use pdfqa_vector::{DenseIndex, DenseSnapshot};

/// Counts letters a/b/c; easy to reason about similarities.
struct LetterEmbedder { calls: AtomicUsize }

impl LetterEmbedder {
	fn new() -> Arc<Self> { Arc::new(Self { calls: AtomicUsize::new(0) }) }
}

impl Embedder for LetterEmbedder {
	fn id(&self) -> &str { "letters" }
	fn dim(&self) -> usize { 3 }
	fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if text.contains('!') { anyhow::bail!("cannot embed '{text}'"); }
		Ok(['a', 'b', 'c'].iter().map(|l| text.chars().filter(|c| c == l).count() as f32).collect())
	}
}

fn chunk(doc: &str, i: usize, text: &str) -> Chunk {
	Chunk {
		chunk_id: format!("{doc}:{i}"),
		document_id: doc.into(),
		chunk_index: i,
		page_number: 1,
		start_offset: 0,
		end_offset: text.chars().count(),
		overlap_with_previous: 0,
		text: text.into(),
	}
}

#[test]
fn search_ranks_by_cosine() {
	let index = DenseIndex::new(LetterEmbedder::new());
	index.upsert(&chunk("d", 0, "aaa")).unwrap();
	index.upsert(&chunk("d", 1, "bbb")).unwrap();
	index.upsert(&chunk("d", 2, "aab")).unwrap();

	let hits = index.search("a", 2).unwrap();
	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].chunk_id, "d:0");
	assert_eq!(hits[1].chunk_id, "d:2");
	assert_eq!(hits[0].rank, 1);
	assert!(hits.iter().all(|h| h.source == SourceKind::Dense));
	assert!(hits[0].score >= hits[1].score);
}

#[test]
fn fewer_entries_than_k_and_zero_k() {
	let index = DenseIndex::new(LetterEmbedder::new());
	index.upsert(&chunk("d", 0, "abc")).unwrap();
	assert_eq!(index.search("a", 10).unwrap().len(), 1);
	assert!(matches!(index.search("a", 0), Err(Error::Query(_))));
}

#[test]
fn failed_embedding_leaves_document_out() {
	let index = DenseIndex::new(LetterEmbedder::new());
	let chunks = vec![chunk("d", 0, "aa"), chunk("d", 1, "bad!")];
	let err = index.prepare(&chunks).unwrap_err();
	assert!(matches!(err, Error::Ingest { ref document_id, .. } if document_id == "d"));
	assert!(index.is_empty());
}

#[test]
fn unchanged_text_reuses_vectors() {
	let embedder = LetterEmbedder::new();
	let index = DenseIndex::new(embedder.clone());
	let v1 = vec![chunk("d", 0, "aa"), chunk("d", 1, "bb")];
	let prepared = index.prepare(&v1).unwrap();
	index.commit_document("d", prepared);
	assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

	let v2 = vec![chunk("d", 0, "aa"), chunk("d", 1, "cc")];
	let prepared = index.prepare(&v2).unwrap();
	index.commit_document("d", prepared);
	assert_eq!(embedder.calls.load(Ordering::SeqCst), 3, "only the changed chunk is embedded again");
	assert_eq!(index.len(), 2);
}

#[test]
fn remove_drops_only_that_document() {
	let index = DenseIndex::new(LetterEmbedder::new());
	index.upsert(&chunk("x", 0, "a")).unwrap();
	index.upsert(&chunk("y", 0, "b")).unwrap();
	assert_eq!(index.remove("x"), 1);
	assert!(!index.contains("x:0"));
	assert!(index.contains("y:0"));
}

#[test]
fn snapshot_round_trip_and_model_check() {
	let index = DenseIndex::new(LetterEmbedder::new());
	index.upsert(&chunk("d", 0, "abc")).unwrap();
	let json = serde_json::to_string(&index.snapshot()).unwrap();
	let snap: DenseSnapshot = serde_json::from_str(&json).unwrap();

	let restored = DenseIndex::from_snapshot(LetterEmbedder::new(), snap.clone()).unwrap();
	assert_eq!(restored.snapshot(), index.snapshot());

	let mut foreign = snap;
	foreign.embedder_id = "other-model".into();
	assert!(matches!(DenseIndex::from_snapshot(LetterEmbedder::new(), foreign), Err(Error::Index(_))));
}
