use proptest::prelude::*;

use pdfqa_core::config::ScoreNormalization;
use pdfqa_core::types::{RetrievalResult, SourceKind};
use pdfqa_hybrid::fuse;

fn ranked(scores: Vec<f32>, prefix: &str, source: SourceKind) -> Vec<RetrievalResult> {
    let mut scored: Vec<(String, f32)> = scores.into_iter().enumerate().map(|(i, s)| (format!("{prefix}{i}"), s)).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    RetrievalResult::ranked(scored, source)
}

fn normalization() -> impl Strategy<Value = ScoreNormalization> {
    prop_oneof![Just(ScoreNormalization::Max), Just(ScoreNormalization::MinMax)]
}

proptest! {
    #[test]
    fn fused_scores_stay_within_weight_sum(
        dense in prop::collection::vec(-1.0f32..1.0, 0..20),
        sparse in prop::collection::vec(0.0f32..30.0, 0..20),
        dw in 0.0f32..2.0,
        sw in 0.01f32..2.0,
        k in 1usize..30,
        norm in normalization(),
    ) {
        // overlapping id space so some chunks appear in both lists
        let d = ranked(dense, "c", SourceKind::Dense);
        let s = ranked(sparse, "c", SourceKind::Sparse);
        let out = fuse(&d, &s, dw, sw, k, norm).unwrap();
        prop_assert!(out.len() <= k);
        for r in &out {
            prop_assert!(r.score >= 0.0);
            prop_assert!(r.score <= dw + sw + 1e-6);
        }
        for pair in out.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn empty_sparse_falls_back_to_scaled_dense(
        dense in prop::collection::vec(0.01f32..1.0, 1..20),
        dw in 0.01f32..2.0,
        k in 1usize..30,
    ) {
        let d = ranked(dense, "d", SourceKind::Dense);
        let out = fuse(&d, &[], dw, 0.3, k, ScoreNormalization::Max).unwrap();
        let max = d[0].score;
        let expected: Vec<(String, f32)> = d.iter().take(k).map(|r| (r.chunk_id.clone(), dw * r.score / max)).collect();
        prop_assert_eq!(out.len(), expected.len());
        for (got, (id, score)) in out.iter().zip(&expected) {
            prop_assert_eq!(&got.chunk_id, id);
            prop_assert!((got.score - score).abs() < 1e-5);
        }
    }
}

#[test]
fn both_lists_empty() {
    assert!(fuse(&[], &[], 0.7, 0.3, 5, ScoreNormalization::Max).unwrap().is_empty());
}
