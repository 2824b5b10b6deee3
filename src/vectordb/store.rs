//! The vector-store contract shared by every backend
//!
//! Every operation is scoped by `user_id`: no method may return or mutate
//! another user's data, even when the ID is known. Cross-tenant lookups
//! resolve to not-found semantics rather than an authorization error, so
//! existence is never leaked across tenants.

use super::fusion::{mmr_fusion, reciprocal_rank_fusion, weighted_fusion};
use super::types::{RankingMethod, SearchMode, SearchResult, StoreStats, VectorSearchConfig};
use crate::chunking::Metadata;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract contract for vector-store backends
///
/// `hybrid_search` is implemented once here and inherited by every
/// backend: semantic and lexical search run concurrently, a failing side is
/// logged and treated as empty, and fusion failure degrades to
/// semantic-only results. A user query never hard-fails because one
/// sub-search or the fusion step misbehaved.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a vector with its text and metadata. Embedding dimensionality
    /// is validated against the collection; mismatches are rejected rather
    /// than silently padded or truncated.
    async fn store_vector(
        &self,
        id: &str,
        text: &str,
        embedding: &[f32],
        user_id: &str,
        metadata: Option<Metadata>,
    ) -> Result<bool, StoreError>;

    /// Approximate-nearest-neighbor search scoped to `user_id`
    async fn search_vectors(
        &self,
        query_embedding: &[f32],
        user_id: &str,
        config: &VectorSearchConfig,
    ) -> Result<Vec<SearchResult>, StoreError>;

    /// Full-text search scoped to `user_id`. Backends without lexical
    /// capability legitimately return an empty list; callers treat that as
    /// "no lexical signal", not an error.
    async fn search_text(
        &self,
        query_text: &str,
        user_id: &str,
        config: &VectorSearchConfig,
    ) -> Result<Vec<SearchResult>, StoreError>;

    /// Delete a vector after verifying ownership. Returns `false` when the
    /// vector does not exist for this user.
    async fn delete_vector(&self, id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Fetch one vector; `None` when it does not exist for this user
    async fn get_vector(&self, id: &str, user_id: &str)
        -> Result<Option<SearchResult>, StoreError>;

    /// Page through a user's stored vectors
    async fn list_vectors(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, StoreError>;

    /// Per-user statistics
    async fn get_stats(&self, user_id: &str) -> Result<StoreStats, StoreError>;

    /// Run semantic and lexical search concurrently and fuse the results
    /// according to `config.ranking_method`
    async fn hybrid_search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        user_id: &str,
        config: &VectorSearchConfig,
    ) -> Result<Vec<SearchResult>, StoreError> {
        // Each side fetches with mode pinned to its own leg; failures are
        // isolated so one leg never sinks the other.
        let semantic_config = VectorSearchConfig {
            search_mode: SearchMode::Semantic,
            ..config.clone()
        };
        let lexical_config = VectorSearchConfig {
            search_mode: SearchMode::Lexical,
            ..config.clone()
        };

        let (semantic, lexical) = tokio::join!(
            self.search_vectors(query_embedding, user_id, &semantic_config),
            self.search_text(query_text, user_id, &lexical_config),
        );

        let semantic = match semantic {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("semantic search failed in hybrid path: {}", e);
                Vec::new()
            }
        };
        let lexical = match lexical {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("lexical search failed in hybrid path: {}", e);
                Vec::new()
            }
        };

        let fused = match config.ranking_method {
            RankingMethod::Rrf => reciprocal_rank_fusion(&semantic, &lexical, config.top_k),
            RankingMethod::Mmr => mmr_fusion(&semantic, &lexical, config.mmr_lambda, config.top_k),
            RankingMethod::Weighted => match weighted_fusion(
                &semantic,
                &lexical,
                config.semantic_weight,
                config.lexical_weight,
                config.top_k,
            ) {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(
                        "weighted fusion failed ({}), returning semantic-only results",
                        e
                    );
                    let mut fallback = semantic;
                    fallback.truncate(config.top_k);
                    fallback
                }
            },
        };

        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stub backend whose semantic leg always raises
    struct BrokenSemanticStore;

    #[async_trait]
    impl VectorStore for BrokenSemanticStore {
        async fn store_vector(
            &self,
            _id: &str,
            _text: &str,
            _embedding: &[f32],
            _user_id: &str,
            _metadata: Option<Metadata>,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn search_vectors(
            &self,
            _query_embedding: &[f32],
            _user_id: &str,
            _config: &VectorSearchConfig,
        ) -> Result<Vec<SearchResult>, StoreError> {
            Err(StoreError::Backend("vector index offline".to_string()))
        }

        async fn search_text(
            &self,
            _query_text: &str,
            _user_id: &str,
            _config: &VectorSearchConfig,
        ) -> Result<Vec<SearchResult>, StoreError> {
            Ok(vec![SearchResult::new("lex-1", "lexical hit", 2.0)])
        }

        async fn delete_vector(&self, _id: &str, _user_id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn get_vector(
            &self,
            _id: &str,
            _user_id: &str,
        ) -> Result<Option<SearchResult>, StoreError> {
            Ok(None)
        }

        async fn list_vectors(
            &self,
            _user_id: &str,
            _limit: usize,
            _offset: usize,
        ) -> Result<Vec<SearchResult>, StoreError> {
            Ok(Vec::new())
        }

        async fn get_stats(&self, _user_id: &str) -> Result<StoreStats, StoreError> {
            Ok(StoreStats {
                backend: "broken-semantic".to_string(),
                vector_count: 0,
                dimension: None,
            })
        }
    }

    #[tokio::test]
    async fn test_hybrid_survives_semantic_failure() {
        let store = BrokenSemanticStore;
        let config = VectorSearchConfig::default();
        let results = store
            .hybrid_search("query", &[0.1, 0.2], "u1", &config)
            .await
            .expect("hybrid search must not propagate sub-search errors");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "lex-1");
    }

    #[tokio::test]
    async fn test_hybrid_weighted_bad_config_degrades() {
        let store = BrokenSemanticStore;
        let config = VectorSearchConfig {
            ranking_method: RankingMethod::Weighted,
            semantic_weight: -1.0,
            ..VectorSearchConfig::default()
        };
        // Weighted fusion rejects the weights; the call still succeeds with
        // semantic-only (here empty) results.
        let results = store
            .hybrid_search("query", &[0.1, 0.2], "u1", &config)
            .await
            .expect("degraded, not failed");
        assert!(results.is_empty());
    }
}
