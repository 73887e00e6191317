//! Weighted score fusion of the dense and sparse rankings.

use std::cmp::Ordering;
use std::collections::HashMap;

use pdfqa_core::config::{validate_weights, ScoreNormalization};
use pdfqa_core::error::{Error, Result};
use pdfqa_core::types::{ChunkId, RetrievalResult, SourceKind};

/// First score seen per list; a repeated id in the same list keeps its earlier (better ranked) entry.
#[derive(Debug, Clone, Copy)]
struct Contribution {
    dense: Option<f32>,
    sparse: Option<f32>,
    best_rank: usize,
}

impl Default for Contribution {
    fn default() -> Self {
        Self { dense: None, sparse: None, best_rank: usize::MAX }
    }
}

/// Merge two ranked lists into the top `k` by
/// `dense_weight * norm(dense) + sparse_weight * norm(sparse)`.
///
/// A chunk missing from one list gets 0 from it, so an empty list degrades to the
/// other strategy's ranking. Ties go to the better individual rank, then the smaller id.
pub fn fuse(
    dense: &[RetrievalResult],
    sparse: &[RetrievalResult],
    dense_weight: f32,
    sparse_weight: f32,
    k: usize,
    normalization: ScoreNormalization,
) -> Result<Vec<RetrievalResult>> {
    validate_weights(dense_weight, sparse_weight).map_err(Error::Query)?;
    if k == 0 {
        return Err(Error::Query("k must be >= 1".into()));
    }

    let mut merged: HashMap<&str, Contribution> = HashMap::new();
    for (hit, norm) in dense.iter().zip(normalize(dense, normalization)) {
        let c = merged.entry(hit.chunk_id.as_str()).or_default();
        c.dense.get_or_insert(norm);
        c.best_rank = c.best_rank.min(hit.rank);
    }
    for (hit, norm) in sparse.iter().zip(normalize(sparse, normalization)) {
        let c = merged.entry(hit.chunk_id.as_str()).or_default();
        c.sparse.get_or_insert(norm);
        c.best_rank = c.best_rank.min(hit.rank);
    }

    let mut scored: Vec<(&str, f32, usize)> = merged
        .into_iter()
        .map(|(id, c)| (id, dense_weight * c.dense.unwrap_or(0.0) + sparse_weight * c.sparse.unwrap_or(0.0), c.best_rank))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.2.cmp(&b.2))
            .then_with(|| a.0.cmp(b.0))
    });
    scored.truncate(k);
    let fused: Vec<(ChunkId, f32)> = scored.into_iter().map(|(id, s, _)| (id.to_string(), s)).collect();
    Ok(RetrievalResult::ranked(fused, SourceKind::Fused))
}

/// Scores mapped onto [0, 1]; negative or non-finite scores count as 0.
fn normalize(results: &[RetrievalResult], normalization: ScoreNormalization) -> Vec<f32> {
    let scores: Vec<f32> = results.iter().map(|r| if r.score.is_finite() { r.score.max(0.0) } else { 0.0 }).collect();
    let max = scores.iter().copied().fold(0.0f32, f32::max);
    match normalization {
        ScoreNormalization::Max => {
            if max <= 0.0 {
                return vec![0.0; scores.len()];
            }
            scores.iter().map(|s| (s / max).clamp(0.0, 1.0)).collect()
        }
        ScoreNormalization::MinMax => {
            let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
            if max <= 0.0 {
                return vec![0.0; scores.len()];
            }
            let span = max - min;
            if span <= f32::EPSILON {
                return vec![1.0; scores.len()];
            }
            scores.iter().map(|s| ((s - min) / span).clamp(0.0, 1.0)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[(&str, f32)], source: SourceKind) -> Vec<RetrievalResult> {
        RetrievalResult::ranked(items.iter().map(|(id, s)| (id.to_string(), *s)).collect(), source)
    }

    #[test]
    fn both_empty_is_empty() {
        let out = fuse(&[], &[], 0.7, 0.3, 5, ScoreNormalization::Max).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn rejects_bad_weights_and_k() {
        assert!(matches!(fuse(&[], &[], 0.0, 0.0, 5, ScoreNormalization::Max), Err(Error::Query(_))));
        assert!(matches!(fuse(&[], &[], -1.0, 1.0, 5, ScoreNormalization::Max), Err(Error::Query(_))));
        assert!(matches!(fuse(&[], &[], 0.5, 0.5, 0, ScoreNormalization::Max), Err(Error::Query(_))));
    }

    #[test]
    fn combines_weighted_scores() {
        let dense = list(&[("a", 0.9), ("b", 0.45)], SourceKind::Dense);
        let sparse = list(&[("b", 4.0), ("c", 2.0)], SourceKind::Sparse);
        let out = fuse(&dense, &sparse, 0.7, 0.3, 10, ScoreNormalization::Max).unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!((out[0].score - 0.7).abs() < 1e-6);
        assert!((out[1].score - (0.35 + 0.3)).abs() < 1e-6);
        assert!((out[2].score - 0.15).abs() < 1e-6);
        assert!(out.iter().all(|r| r.source == SourceKind::Fused));
        assert_eq!(out[2].rank, 3);
    }

    #[test]
    fn ties_prefer_better_individual_rank_then_id() {
        let dense = list(&[("x", 1.0)], SourceKind::Dense);
        let sparse = list(&[("y", 1.0)], SourceKind::Sparse);
        let out = fuse(&dense, &sparse, 0.5, 0.5, 2, ScoreNormalization::Max).unwrap();
        // both rank 1 in their own list
        assert_eq!(out[0].chunk_id, "x");

        let dense = list(&[("m", 2.0), ("b", 1.0)], SourceKind::Dense);
        let sparse = list(&[("z", 2.0), ("a", 1.0)], SourceKind::Sparse);
        let out = fuse(&dense, &sparse, 1.0, 1.0, 4, ScoreNormalization::Max).unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["m", "z", "a", "b"]);
    }

    #[test]
    fn negative_cosine_counts_as_zero() {
        let dense = list(&[("a", 0.5), ("b", -0.3)], SourceKind::Dense);
        let out = fuse(&dense, &[], 1.0, 1.0, 5, ScoreNormalization::Max).unwrap();
        assert_eq!(out[1].chunk_id, "b");
        assert_eq!(out[1].score, 0.0);
    }

    #[test]
    fn min_max_variant() {
        let dense = list(&[("a", 0.9), ("b", 0.6), ("c", 0.3)], SourceKind::Dense);
        let out = fuse(&dense, &[], 1.0, 0.5, 5, ScoreNormalization::MinMax).unwrap();
        assert!((out[0].score - 1.0).abs() < 1e-6);
        assert!((out[1].score - 0.5).abs() < 1e-5);
        assert!(out[2].score.abs() < 1e-6);

        let flat = list(&[("a", 0.4), ("b", 0.4)], SourceKind::Dense);
        let out = fuse(&flat, &[], 1.0, 0.0, 5, ScoreNormalization::MinMax).unwrap();
        assert!(out.iter().all(|r| (r.score - 1.0).abs() < 1e-6));
    }

    #[test]
    fn repeated_id_keeps_first_score_even_when_zero() {
        let dense = list(&[("x", 1.0), ("d", 0.0), ("d", 0.8)], SourceKind::Dense);
        let out = fuse(&dense, &[], 1.0, 0.0, 5, ScoreNormalization::Max).unwrap();
        assert_eq!(out.len(), 2);
        let d = out.iter().find(|r| r.chunk_id == "d").unwrap();
        assert_eq!(d.score, 0.0);
        assert_eq!(d.rank, 2);
    }

    #[test]
    fn truncates_to_k() {
        let dense = list(&[("a", 3.0), ("b", 2.0), ("c", 1.0)], SourceKind::Dense);
        assert_eq!(fuse(&dense, &[], 1.0, 1.0, 2, ScoreNormalization::Max).unwrap().len(), 2);
    }
}
