//! Shared data contracts for search across all vector-store backends

use crate::chunking::Metadata;
use serde::{Deserialize, Serialize};

/// One retrieved item
///
/// `score` is the fused or final ranking score; its scale depends on the
/// ranking method and is not comparable across methods. The component
/// scores are preserved for explainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Unique per user within a collection
    pub id: String,
    pub text: String,
    pub score: f32,
    /// Cosine-similarity score from the semantic side, when present
    pub semantic_score: Option<f32>,
    /// Lexical relevance score (BM25 or token overlap), when present
    pub lexical_score: Option<f32>,
    pub metadata: Option<Metadata>,
    /// Populated only when `include_embeddings` is requested
    pub embedding: Option<Vec<f32>>,
}

impl SearchResult {
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score,
            semantic_score: None,
            lexical_score: None,
            metadata: None,
            embedding: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Semantic,
    Lexical,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMethod {
    Rrf,
    Weighted,
    Mmr,
}

/// Query-time parameters shared by every backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchConfig {
    pub top_k: usize,
    pub search_mode: SearchMode,
    pub ranking_method: RankingMethod,
    /// Weight on the semantic side for weighted fusion; conventionally sums
    /// with `lexical_weight` to 1.0 but that is not enforced
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    /// Relevance/diversity trade-off in [0, 1] for MMR ranking
    pub mmr_lambda: f32,
    /// Return stored embeddings with results; off by default since
    /// embeddings are large and rarely needed by callers
    pub include_embeddings: bool,
    /// Results must carry all of these key/value pairs in their metadata
    pub filter_metadata: Option<Metadata>,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            search_mode: SearchMode::Hybrid,
            ranking_method: RankingMethod::Rrf,
            semantic_weight: 0.7,
            lexical_weight: 0.3,
            mmr_lambda: 0.5,
            include_embeddings: false,
            filter_metadata: None,
        }
    }
}

impl VectorSearchConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_ranking(mut self, method: RankingMethod) -> Self {
        self.ranking_method = method;
        self
    }
}

/// Per-user store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub backend: String,
    pub vector_count: usize,
    pub dimension: Option<usize>,
}

/// Check that a result's metadata carries every key/value pair in `filter`
pub(crate) fn matches_filter(metadata: Option<&Metadata>, filter: Option<&Metadata>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    if filter.is_empty() {
        return true;
    }
    let Some(metadata) = metadata else {
        return false;
    };
    filter
        .iter()
        .all(|(k, v)| metadata.get(k).map(|m| m == v).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        let mut meta = Metadata::new();
        meta.insert("topic".to_string(), serde_json::json!("rust"));
        meta.insert("year".to_string(), serde_json::json!(2025));

        let mut filter = Metadata::new();
        filter.insert("topic".to_string(), serde_json::json!("rust"));
        assert!(matches_filter(Some(&meta), Some(&filter)));

        filter.insert("year".to_string(), serde_json::json!(2024));
        assert!(!matches_filter(Some(&meta), Some(&filter)));

        assert!(matches_filter(None, None));
        assert!(!matches_filter(None, Some(&filter)));
        assert!(matches_filter(Some(&meta), None));
    }

    #[test]
    fn test_default_search_config() {
        let config = VectorSearchConfig::default();
        assert_eq!(config.top_k, 10);
        assert_eq!(config.search_mode, SearchMode::Hybrid);
        assert_eq!(config.ranking_method, RankingMethod::Rrf);
        assert!(!config.include_embeddings);
    }
}
