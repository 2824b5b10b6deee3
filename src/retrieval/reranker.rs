//! Diversity-aware MMR reranking over already-scored results
//!
//! Standalone component: it operates purely on [`SearchResult`] lists and
//! pairwise similarity, independent of how the list was produced. The
//! similarity signal combines embedding cosine, lexical word-set Jaccard,
//! and metadata key/value Jaccard, averaged over the signals enabled in the
//! configuration. A caller-supplied similarity function can replace the
//! built-in combination entirely.

use crate::vectordb::fusion::{cosine_similarity, jaccard, token_set};
use crate::vectordb::SearchResult;
use ahash::AHashSet;

/// Reranker configuration
#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// Relevance/diversity trade-off in [0, 1]; 1.0 is pure relevance
    pub lambda: f32,
    pub use_semantic_diversity: bool,
    pub use_lexical_diversity: bool,
    pub use_metadata_diversity: bool,
    /// Stop early once the best marginal score falls below this
    pub min_diversity_score: Option<f32>,
    /// Safety bound against pathological inputs
    pub max_iterations: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            use_semantic_diversity: true,
            use_lexical_diversity: true,
            use_metadata_diversity: false,
            min_diversity_score: None,
            max_iterations: 1000,
        }
    }
}

/// Max Marginal Relevance reranker
pub struct MmrReranker {
    config: RerankConfig,
}

impl MmrReranker {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RerankConfig::default())
    }

    /// Greedily re-select up to `target_count` results, trading relevance
    /// against the maximum similarity to anything already chosen.
    /// Zero- and one-element inputs are returned unchanged.
    pub fn rerank_results(
        &self,
        results: Vec<SearchResult>,
        target_count: usize,
        lambda: Option<f32>,
    ) -> Vec<SearchResult> {
        let config = &self.config;
        self.rerank_inner(results, target_count, lambda, |a, b| {
            combined_similarity(a, b, config)
        })
    }

    /// Rerank with a caller-supplied pairwise similarity function, enabling
    /// domain-specific diversity notions without modifying the reranker
    pub fn rerank_with_custom_diversity<F>(
        &self,
        results: Vec<SearchResult>,
        similarity: F,
        target_count: usize,
        lambda: Option<f32>,
    ) -> Vec<SearchResult>
    where
        F: Fn(&SearchResult, &SearchResult) -> f32,
    {
        self.rerank_inner(results, target_count, lambda, similarity)
    }

    fn rerank_inner<F>(
        &self,
        mut candidates: Vec<SearchResult>,
        target_count: usize,
        lambda: Option<f32>,
        similarity: F,
    ) -> Vec<SearchResult>
    where
        F: Fn(&SearchResult, &SearchResult) -> f32,
    {
        if target_count == 0 {
            return Vec::new();
        }
        if candidates.len() <= 1 {
            return candidates;
        }

        let lambda = lambda.unwrap_or(self.config.lambda).clamp(0.0, 1.0);

        // Seed with the most relevant candidate
        let seed = candidates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);

        let mut selected = Vec::with_capacity(target_count.min(candidates.len()));
        selected.push(candidates.remove(seed));

        let mut iterations = 0usize;
        while selected.len() < target_count && !candidates.is_empty() {
            iterations += 1;
            if iterations > self.config.max_iterations {
                tracing::warn!(
                    "MMR reranking hit the iteration bound ({}), stopping early",
                    self.config.max_iterations
                );
                break;
            }

            let mut best_index = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (index, candidate) in candidates.iter().enumerate() {
                let max_similarity = selected
                    .iter()
                    .map(|chosen| similarity(candidate, chosen))
                    .fold(f32::NEG_INFINITY, f32::max);
                let marginal = lambda * candidate.score - (1.0 - lambda) * max_similarity;
                if marginal > best_score {
                    best_score = marginal;
                    best_index = index;
                }
            }

            if let Some(min) = self.config.min_diversity_score {
                if best_score < min {
                    tracing::debug!(
                        "no candidate clears min_diversity_score {}, stopping at {} results",
                        min,
                        selected.len()
                    );
                    break;
                }
            }

            selected.push(candidates.remove(best_index));
        }

        selected
    }
}

/// Average the enabled similarity signals. A signal that cannot be computed
/// for a pair (missing embedding, missing metadata) is skipped rather than
/// counted as zero, so absent data never penalizes or rewards diversity.
fn combined_similarity(a: &SearchResult, b: &SearchResult, config: &RerankConfig) -> f32 {
    let mut signals: Vec<f32> = Vec::with_capacity(3);

    if config.use_semantic_diversity {
        if let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) {
            signals.push(cosine_similarity(ea, eb));
        }
    }

    if config.use_lexical_diversity {
        signals.push(jaccard(&token_set(&a.text), &token_set(&b.text)));
    }

    if config.use_metadata_diversity {
        if let (Some(ma), Some(mb)) = (&a.metadata, &b.metadata) {
            let pairs_a: AHashSet<String> =
                ma.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            let pairs_b: AHashSet<String> =
                mb.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            signals.push(jaccard(&pairs_a, &pairs_b));
        }
    }

    if signals.is_empty() {
        return 0.0;
    }
    signals.iter().sum::<f32>() / signals.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f32, text: &str) -> SearchResult {
        SearchResult::new(id, text, score)
    }

    fn with_embedding(mut r: SearchResult, e: Vec<f32>) -> SearchResult {
        r.embedding = Some(e);
        r
    }

    #[test]
    fn test_singleton_returned_unchanged() {
        let reranker = MmrReranker::with_defaults();
        let input = vec![result("only", 0.7, "lone result")];
        let output = reranker.rerank_results(input.clone(), 5, None);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].id, "only");
        assert_eq!(output[0].score, input[0].score);
    }

    #[test]
    fn test_empty_input() {
        let reranker = MmrReranker::with_defaults();
        assert!(reranker.rerank_results(Vec::new(), 5, None).is_empty());
    }

    #[test]
    fn test_diversity_preferred_over_redundancy() {
        // Identical relevance; "near" mirrors the top result's embedding
        // while "far" is orthogonal. With lambda < 1 the diverse candidate
        // must be selected first.
        let config = RerankConfig {
            use_lexical_diversity: false,
            ..RerankConfig::default()
        };
        let reranker = MmrReranker::new(config);
        let input = vec![
            with_embedding(result("top", 0.9, "t"), vec![1.0, 0.0]),
            with_embedding(result("near", 0.5, "n"), vec![1.0, 0.0]),
            with_embedding(result("far", 0.5, "f"), vec![0.0, 1.0]),
        ];
        let output = reranker.rerank_results(input, 3, Some(0.5));
        let order: Vec<&str> = output.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["top", "far", "near"]);
    }

    #[test]
    fn test_lexical_diversity_without_embeddings() {
        let config = RerankConfig {
            use_semantic_diversity: false,
            use_lexical_diversity: true,
            ..RerankConfig::default()
        };
        let reranker = MmrReranker::new(config);
        let input = vec![
            result("top", 0.9, "rust borrow checker rules"),
            result("dup", 0.5, "rust borrow checker rules"),
            result("other", 0.5, "sourdough starter hydration"),
        ];
        let output = reranker.rerank_results(input, 3, Some(0.5));
        assert_eq!(output[1].id, "other");
    }

    #[test]
    fn test_missing_embeddings_never_panic() {
        let reranker = MmrReranker::with_defaults();
        let input = vec![
            result("a", 0.9, "alpha"),
            with_embedding(result("b", 0.8, "beta"), vec![1.0, 0.0]),
            result("c", 0.7, "gamma"),
        ];
        let output = reranker.rerank_results(input, 3, None);
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn test_min_diversity_score_stops_early() {
        let config = RerankConfig {
            min_diversity_score: Some(10.0),
            ..RerankConfig::default()
        };
        let reranker = MmrReranker::new(config);
        let input = vec![
            result("a", 0.9, "alpha"),
            result("b", 0.8, "beta"),
            result("c", 0.7, "gamma"),
        ];
        // Marginal scores are bounded well below 10, so only the seed stays
        let output = reranker.rerank_results(input, 3, None);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].id, "a");
    }

    #[test]
    fn test_custom_diversity_function() {
        let reranker = MmrReranker::with_defaults();
        let input = vec![
            result("a", 0.9, "x"),
            result("b", 0.8, "x"),
            result("c", 0.1, "x"),
        ];
        // Custom similarity: everything with the same first letter of ID is
        // identical; "a" and "b" never collide with "c"
        let output = reranker.rerank_with_custom_diversity(
            input,
            |x, y| {
                if x.id.as_bytes()[0].abs_diff(y.id.as_bytes()[0]) <= 1 {
                    1.0
                } else {
                    0.0
                }
            },
            2,
            Some(0.5),
        );
        assert_eq!(output[0].id, "a");
        assert_eq!(output[1].id, "c");
    }

    #[test]
    fn test_target_count_respected() {
        let reranker = MmrReranker::with_defaults();
        let input: Vec<SearchResult> = (0..10)
            .map(|i| result(&format!("r{}", i), 1.0 - i as f32 * 0.05, "text"))
            .collect();
        let output = reranker.rerank_results(input, 4, None);
        assert_eq!(output.len(), 4);
    }
}
