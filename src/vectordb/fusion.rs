//! Result-fusion algorithms for hybrid search
//!
//! Three strategies combine a semantic and a lexical result list:
//! Reciprocal Rank Fusion (the default), weighted min-max fusion, and Max
//! Marginal Relevance re-selection over an RRF pool. All three are total:
//! degenerate inputs (empty lists, missing embeddings, zero-norm vectors)
//! produce an ordering rather than an error.

use super::types::SearchResult;
use ahash::{AHashMap, AHashSet};
use ndarray::ArrayView1;
use thiserror::Error;

/// RRF constant; the conventional value from the literature
pub const RRF_K: f32 = 60.0;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be positive")]
    InvalidWeights,
}

/// Cosine similarity that treats degenerate input as "no similarity":
/// mismatched lengths, empty, or zero-norm vectors score 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let va = ArrayView1::from(a);
    let vb = ArrayView1::from(b);
    let dot = va.dot(&vb);
    let norm_a = va.dot(&va).sqrt();
    let norm_b = vb.dot(&vb).sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Lowercased alphanumeric token set for lexical similarity
pub(crate) fn token_set(text: &str) -> AHashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Jaccard similarity over token sets; 0.0 when the union is empty
pub(crate) fn jaccard<T: std::hash::Hash + Eq>(a: &AHashSet<T>, b: &AHashSet<T>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

struct PooledEntry {
    result: SearchResult,
    semantic_rank: Option<usize>,
    lexical_rank: Option<usize>,
}

/// Pool two ranked lists by ID and score each entry with RRF:
/// `1/(k + semantic_rank) + 1/(k + lexical_rank)`, ranks 1-based, with a
/// missing list contributing rank `len + 1` as a mild penalty so a
/// single-list match still surfaces. Component scores are preserved.
fn rrf_pool(semantic: &[SearchResult], lexical: &[SearchResult]) -> Vec<SearchResult> {
    let mut pool: AHashMap<String, PooledEntry> = AHashMap::new();

    for (rank, result) in semantic.iter().enumerate() {
        let entry = pool
            .entry(result.id.clone())
            .or_insert_with(|| PooledEntry {
                result: result.clone(),
                semantic_rank: None,
                lexical_rank: None,
            });
        if entry.semantic_rank.is_none() {
            entry.semantic_rank = Some(rank + 1);
        }
        entry.result.semantic_score = Some(result.semantic_score.unwrap_or(result.score));
    }

    for (rank, result) in lexical.iter().enumerate() {
        let entry = pool
            .entry(result.id.clone())
            .or_insert_with(|| PooledEntry {
                result: result.clone(),
                semantic_rank: None,
                lexical_rank: None,
            });
        if entry.lexical_rank.is_none() {
            entry.lexical_rank = Some(rank + 1);
        }
        entry.result.lexical_score = Some(result.lexical_score.unwrap_or(result.score));
        if entry.result.embedding.is_none() {
            entry.result.embedding = result.embedding.clone();
        }
    }

    let semantic_miss = (semantic.len() + 1) as f32;
    let lexical_miss = (lexical.len() + 1) as f32;

    let mut fused: Vec<SearchResult> = pool
        .into_values()
        .map(|entry| {
            let semantic_rank = entry
                .semantic_rank
                .map(|r| r as f32)
                .unwrap_or(semantic_miss);
            let lexical_rank = entry.lexical_rank.map(|r| r as f32).unwrap_or(lexical_miss);
            let mut result = entry.result;
            result.score = 1.0 / (RRF_K + semantic_rank) + 1.0 / (RRF_K + lexical_rank);
            result
        })
        .collect();

    sort_by_score(&mut fused);
    fused
}

/// Reciprocal Rank Fusion, truncated to `top_k`
pub fn reciprocal_rank_fusion(
    semantic: &[SearchResult],
    lexical: &[SearchResult],
    top_k: usize,
) -> Vec<SearchResult> {
    let mut fused = rrf_pool(semantic, lexical);
    fused.truncate(top_k);
    fused
}

/// Weighted fusion: each list's scores are min-max normalized to [0, 1]
/// independently, then combined as
/// `semantic_weight * semantic + lexical_weight * lexical`, with 0
/// contributed by a list not containing the result. A list whose scores are
/// all equal (including a single-item list) normalizes to 1.0.
pub fn weighted_fusion(
    semantic: &[SearchResult],
    lexical: &[SearchResult],
    semantic_weight: f32,
    lexical_weight: f32,
    top_k: usize,
) -> Result<Vec<SearchResult>, FusionError> {
    if semantic_weight <= 0.0 || lexical_weight <= 0.0 {
        return Err(FusionError::InvalidWeights);
    }

    let semantic_norm = min_max_normalize(semantic);
    let lexical_norm = min_max_normalize(lexical);

    let mut pool: AHashMap<String, (SearchResult, f32)> = AHashMap::new();

    for (result, norm) in semantic.iter().zip(&semantic_norm) {
        let entry = pool
            .entry(result.id.clone())
            .or_insert_with(|| (result.clone(), 0.0));
        entry.0.semantic_score = Some(result.semantic_score.unwrap_or(result.score));
        entry.1 += semantic_weight * norm;
    }

    for (result, norm) in lexical.iter().zip(&lexical_norm) {
        let entry = pool
            .entry(result.id.clone())
            .or_insert_with(|| (result.clone(), 0.0));
        entry.0.lexical_score = Some(result.lexical_score.unwrap_or(result.score));
        if entry.0.embedding.is_none() {
            entry.0.embedding = result.embedding.clone();
        }
        entry.1 += lexical_weight * norm;
    }

    let mut fused: Vec<SearchResult> = pool
        .into_values()
        .map(|(mut result, score)| {
            result.score = score;
            result
        })
        .collect();

    sort_by_score(&mut fused);
    fused.truncate(top_k);
    Ok(fused)
}

/// MMR fusion: RRF over the pooled lists first, then greedy re-selection
/// that trades relevance against similarity to already-chosen results.
/// Candidates lacking an embedding contribute similarity 0 to every
/// comparison, so they are never excluded, only never diversity-penalized.
///
/// Greedy selection is O(top_k * n); acceptable since top_k is small.
pub fn mmr_fusion(
    semantic: &[SearchResult],
    lexical: &[SearchResult],
    lambda: f32,
    top_k: usize,
) -> Vec<SearchResult> {
    let pool = rrf_pool(semantic, lexical);
    mmr_select(pool, lambda, top_k)
}

/// Greedy MMR over a relevance-sorted candidate pool
pub(crate) fn mmr_select(
    mut candidates: Vec<SearchResult>,
    lambda: f32,
    top_k: usize,
) -> Vec<SearchResult> {
    if candidates.len() <= 1 || top_k == 0 {
        candidates.truncate(top_k);
        return candidates;
    }

    let mut selected = Vec::with_capacity(top_k.min(candidates.len()));
    selected.push(candidates.remove(0));

    while selected.len() < top_k && !candidates.is_empty() {
        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (index, candidate) in candidates.iter().enumerate() {
            let max_similarity = selected
                .iter()
                .map(|chosen| embedding_similarity(candidate, chosen))
                .fold(f32::NEG_INFINITY, f32::max);
            let mmr = lambda * candidate.score - (1.0 - lambda) * max_similarity;
            if mmr > best_score {
                best_score = mmr;
                best_index = index;
            }
        }

        selected.push(candidates.remove(best_index));
    }

    selected
}

fn embedding_similarity(a: &SearchResult, b: &SearchResult) -> f32 {
    match (&a.embedding, &b.embedding) {
        (Some(x), Some(y)) => cosine_similarity(x, y),
        _ => 0.0,
    }
}

/// Min-max normalize a result list's scores to [0, 1]; constant lists
/// (including singletons) normalize to 1.0
fn min_max_normalize(results: &[SearchResult]) -> Vec<f32> {
    if results.is_empty() {
        return Vec::new();
    }
    let min = results.iter().map(|r| r.score).fold(f32::INFINITY, f32::min);
    let max = results
        .iter()
        .map(|r| r.score)
        .fold(f32::NEG_INFINITY, f32::max);

    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; results.len()];
    }
    results.iter().map(|r| (r.score - min) / (max - min)).collect()
}

/// Sort by score descending, breaking ties by ID for determinism
fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f32) -> SearchResult {
        SearchResult::new(id, format!("text for {}", id), score)
    }

    fn result_with_embedding(id: &str, score: f32, embedding: Vec<f32>) -> SearchResult {
        result(id, score).with_embedding(embedding)
    }

    #[test]
    fn test_cosine_degenerate_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_known_scenario() {
        // semantic: a (rank 1), b (rank 2); lexical: b (rank 1), c (rank 2)
        let semantic = vec![result("a", 0.9), result("b", 0.5)];
        let lexical = vec![result("b", 0.8), result("c", 0.3)];

        let fused = reciprocal_rank_fusion(&semantic, &lexical, 3);
        let order: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);

        // Exact scores from the formula with 1-based ranks and a
        // missing-list rank of len + 1
        let expect = |sem: f32, lex: f32| 1.0 / (60.0 + sem) + 1.0 / (60.0 + lex);
        assert!((fused[0].score - expect(2.0, 1.0)).abs() < 1e-6);
        assert!((fused[1].score - expect(1.0, 3.0)).abs() < 1e-6);
        assert!((fused[2].score - expect(3.0, 2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_disjoint_lists_bounds() {
        let semantic = vec![result("s1", 0.9), result("s2", 0.8), result("s3", 0.7)];
        let lexical = vec![result("l1", 0.9), result("l2", 0.8)];

        let fused = reciprocal_rank_fusion(&semantic, &lexical, 10);
        assert_eq!(fused.len(), 5);
        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for r in &fused {
            // Each score is exactly 1/(60+rank) + 1/(60+miss)
            assert!(r.score > 0.0 && r.score < 2.0 / 60.0);
        }

        let truncated = reciprocal_rank_fusion(&semantic, &lexical, 2);
        assert_eq!(truncated.len(), 2);
    }

    #[test]
    fn test_rrf_preserves_component_scores() {
        let semantic = vec![result("a", 0.9)];
        let lexical = vec![result("a", 7.5)];
        let fused = reciprocal_rank_fusion(&semantic, &lexical, 10);
        assert_eq!(fused[0].semantic_score, Some(0.9));
        assert_eq!(fused[0].lexical_score, Some(7.5));
    }

    #[test]
    fn test_weighted_rejects_bad_weights() {
        let r = vec![result("a", 0.9)];
        assert!(weighted_fusion(&r, &r, 0.0, 0.5, 10).is_err());
        assert!(weighted_fusion(&r, &r, 0.5, -1.0, 10).is_err());
    }

    #[test]
    fn test_weighted_single_item_normalizes_to_one() {
        let semantic = vec![result("a", 0.42)];
        let lexical: Vec<SearchResult> = Vec::new();
        let fused = weighted_fusion(&semantic, &lexical, 0.7, 0.3, 10).unwrap();
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_combination() {
        let semantic = vec![result("a", 1.0), result("b", 0.0)];
        let lexical = vec![result("b", 1.0), result("c", 0.0)];
        let fused = weighted_fusion(&semantic, &lexical, 0.6, 0.4, 10).unwrap();

        let score_of = |id: &str| fused.iter().find(|r| r.id == id).map(|r| r.score);
        // a: semantic norm 1.0 only; b: semantic 0 + lexical 1; c: lexical 0
        assert!((score_of("a").unwrap() - 0.6).abs() < 1e-6);
        assert!((score_of("b").unwrap() - 0.4).abs() < 1e-6);
        assert!((score_of("c").unwrap() - 0.0).abs() < 1e-6);
        assert_eq!(fused[0].id, "a");
    }

    #[test]
    fn test_mmr_prefers_diverse_candidate() {
        // Both candidates have equal relevance; "near" duplicates the
        // already-top result's embedding, "far" is orthogonal.
        let semantic = vec![
            result_with_embedding("top", 0.9, vec![1.0, 0.0, 0.0]),
            result_with_embedding("near", 0.5, vec![1.0, 0.0, 0.0]),
            result_with_embedding("far", 0.5, vec![0.0, 1.0, 0.0]),
        ];
        let lexical: Vec<SearchResult> = Vec::new();

        let fused = mmr_fusion(&semantic, &lexical, 0.5, 3);
        assert_eq!(fused[0].id, "top");
        assert_eq!(fused[1].id, "far", "diversity should beat redundancy");
        assert_eq!(fused[2].id, "near");
    }

    #[test]
    fn test_mmr_lambda_one_is_pure_relevance() {
        let semantic = vec![
            result_with_embedding("a", 0.9, vec![1.0, 0.0]),
            result_with_embedding("b", 0.8, vec![1.0, 0.0]),
            result_with_embedding("c", 0.7, vec![0.0, 1.0]),
        ];
        let fused = mmr_fusion(&semantic, &[], 1.0, 3);
        let order: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_mmr_missing_embeddings_never_panic() {
        let semantic = vec![
            result("a", 0.9),
            result_with_embedding("b", 0.8, vec![1.0, 0.0]),
            result("c", 0.7),
        ];
        let fused = mmr_fusion(&semantic, &[], 0.5, 3);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn test_mmr_singleton_unchanged() {
        let pool = vec![result("only", 0.5)];
        let out = mmr_select(pool.clone(), 0.3, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "only");
        assert_eq!(out[0].score, pool[0].score);
    }

    #[test]
    fn test_empty_lists() {
        assert!(reciprocal_rank_fusion(&[], &[], 10).is_empty());
        assert!(weighted_fusion(&[], &[], 0.5, 0.5, 10).unwrap().is_empty());
        assert!(mmr_fusion(&[], &[], 0.5, 10).is_empty());
    }
}
