//! Hybrid search orchestration
//!
//! Ties together chunking, embedding, and a vector store: knowledge is
//! chunked, embedded, and stored per chunk; retrieval walks three tiers,
//! each attempted only when the previous one errored or came back empty:
//!
//! 1. the backend's native `hybrid_search` (hybrid mode only),
//! 2. explicit semantic/lexical dispatch with local fusion,
//! 3. a degraded similarity scan over the user's stored texts.
//!
//! Sub-operation failures are isolated and logged; only the total absence
//! of any usable backend produces `success: false`.

use crate::chunking::{ChunkingService, Metadata};
use crate::config::Config;
use crate::embedding::{embed_chunks, embed_texts_with_fallback, EmbeddingProvider};
use crate::retrieval::reranker::MmrReranker;
use crate::vectordb::fusion::{
    cosine_similarity, mmr_fusion, reciprocal_rank_fusion, weighted_fusion,
};
use crate::vectordb::{RankingMethod, SearchMode, SearchResult, VectorSearchConfig, VectorStore};
use ahash::AHashMap;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Chunking error: {0}")]
    Chunking(#[from] crate::chunking::ChunkError),
}

/// Result envelope for knowledge storage
#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcome {
    pub success: bool,
    pub entry_id: String,
    pub chunks_stored: usize,
    pub chunks_failed: usize,
}

/// Result envelope for retrieval
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub success: bool,
    /// True when results came from the degraded fallback path
    pub degraded: bool,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone)]
struct JournalEntry {
    id: String,
    text: String,
}

/// Top-level orchestrator over one [`VectorStore`] and an embedding
/// provider
pub struct HybridSearchService {
    store: Option<Arc<dyn VectorStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: Arc<ChunkingService>,
    reranker: Option<MmrReranker>,
    retrieval: crate::config::RetrievalConfig,
    embedding: crate::config::EmbeddingConfig,
    /// Per-user record of stored texts; feeds the degraded fallback when
    /// the primary store is absent or unusable
    journal: RwLock<AHashMap<String, Vec<JournalEntry>>>,
}

impl HybridSearchService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        config: &Config,
    ) -> Result<Self, crate::chunking::ChunkError> {
        let chunking = Arc::new(
            ChunkingService::new(config.chunk_config())?.with_embedder(embedder.clone()),
        );
        Ok(Self {
            store: None,
            embedder,
            chunking,
            reranker: None,
            retrieval: config.retrieval.clone(),
            embedding: config.embedding.clone(),
            journal: RwLock::new(AHashMap::new()),
        })
    }

    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_reranker(mut self, reranker: MmrReranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn chunking(&self) -> &ChunkingService {
        &self.chunking
    }

    /// Chunk, embed, and store one piece of knowledge. Individual chunk
    /// failures are logged and skipped; the whole call fails only on empty
    /// input.
    pub async fn store_knowledge(
        &self,
        text: &str,
        user_id: &str,
        strategy: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<StoreOutcome, SearchError> {
        if text.trim().is_empty() {
            return Err(SearchError::InvalidInput(
                "Knowledge text cannot be empty".to_string(),
            ));
        }
        if user_id.is_empty() {
            return Err(SearchError::InvalidInput(
                "user_id cannot be empty".to_string(),
            ));
        }

        let strategy = match strategy {
            Some(name) => name.to_string(),
            None => self.chunking.optimal_strategy(text).name().to_string(),
        };
        let mut chunks = self.chunking.chunk_text(text, &strategy, metadata);
        if chunks.is_empty() {
            return Ok(StoreOutcome {
                success: false,
                entry_id: String::new(),
                chunks_stored: 0,
                chunks_failed: 0,
            });
        }

        embed_chunks(
            self.embedder.clone(),
            &mut chunks,
            self.embedding.batch_size,
            self.embedding.max_concurrent,
        )
        .await;

        let entry_id = uuid::Uuid::new_v4().to_string();
        let mut stored = 0usize;
        let mut failed = 0usize;

        for chunk in &chunks {
            let chunk_id = format!("{}:{}", entry_id, chunk.position);
            let embedding = chunk.embedding.clone().unwrap_or_default();

            if let Some(store) = &self.store {
                match store
                    .store_vector(
                        &chunk_id,
                        &chunk.text,
                        &embedding,
                        user_id,
                        Some(chunk.metadata.clone()),
                    )
                    .await
                {
                    Ok(_) => stored += 1,
                    Err(e) => {
                        warn!("failed to store chunk {}: {}", chunk_id, e);
                        failed += 1;
                    }
                }
            }

            self.journal
                .write()
                .unwrap()
                .entry(user_id.to_string())
                .or_default()
                .push(JournalEntry {
                    id: chunk_id,
                    text: chunk.text.clone(),
                });
        }

        Ok(StoreOutcome {
            success: self.store.is_none() || stored > 0,
            entry_id,
            chunks_stored: stored,
            chunks_failed: failed,
        })
    }

    /// Tiered retrieval; see the module docs for the tier order
    pub async fn search(
        &self,
        query_text: &str,
        user_id: &str,
        config: Option<VectorSearchConfig>,
    ) -> Result<SearchOutcome, SearchError> {
        if query_text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let config = config.unwrap_or_else(|| self.default_search_config());

        let query_embedding = match self.embedder.embed(query_text) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("query embedding failed ({}), semantic search disabled", e);
                None
            }
        };

        // Sub-searches over-fetch so fusion has candidates to work with
        let candidate_config = VectorSearchConfig {
            top_k: config.top_k * self.retrieval.search_multiplier.max(1),
            ..config.clone()
        };

        // Tier 1: backend-native hybrid search
        if let (Some(store), Some(embedding), SearchMode::Hybrid) =
            (&self.store, &query_embedding, config.search_mode)
        {
            match store
                .hybrid_search(query_text, embedding, user_id, &config)
                .await
            {
                Ok(results) if !results.is_empty() => {
                    return Ok(self.finish(results, &config, false));
                }
                Ok(_) => debug!("native hybrid search returned no results"),
                Err(e) => warn!("native hybrid search failed: {}", e),
            }
        }

        // Tier 2: explicit dispatch with local fusion
        if let Some(store) = &self.store {
            let results = self
                .tier_two(store, query_text, query_embedding.as_deref(), user_id, &config, &candidate_config)
                .await;
            if !results.is_empty() {
                return Ok(self.finish(results, &config, false));
            }
        }

        // Tier 3: degraded similarity scan over stored texts
        let results = self
            .fallback_search(query_text, query_embedding.as_deref(), user_id, &config)
            .await;
        let usable_backend = self.store.is_some()
            || !self
                .journal
                .read()
                .unwrap()
                .get(user_id)
                .map(|entries| entries.is_empty())
                .unwrap_or(true);

        Ok(SearchOutcome {
            success: usable_backend,
            degraded: !results.is_empty(),
            results: self.rerank_if_configured(results, &config),
        })
    }

    fn default_search_config(&self) -> VectorSearchConfig {
        VectorSearchConfig {
            top_k: self.retrieval.top_k,
            search_mode: self.retrieval.search_mode,
            ranking_method: self.retrieval.ranking_method,
            semantic_weight: self.retrieval.semantic_weight,
            lexical_weight: self.retrieval.lexical_weight,
            mmr_lambda: self.retrieval.mmr_lambda,
            ..VectorSearchConfig::default()
        }
    }

    async fn tier_two(
        &self,
        store: &Arc<dyn VectorStore>,
        query_text: &str,
        query_embedding: Option<&[f32]>,
        user_id: &str,
        config: &VectorSearchConfig,
        candidate_config: &VectorSearchConfig,
    ) -> Vec<SearchResult> {
        match config.search_mode {
            SearchMode::Semantic => {
                let Some(embedding) = query_embedding else {
                    return Vec::new();
                };
                match store.search_vectors(embedding, user_id, config).await {
                    Ok(results) => results,
                    Err(e) => {
                        warn!("semantic search failed: {}", e);
                        Vec::new()
                    }
                }
            }
            SearchMode::Lexical => match store.search_text(query_text, user_id, config).await {
                Ok(results) => results,
                Err(e) => {
                    warn!("lexical search failed: {}", e);
                    Vec::new()
                }
            },
            SearchMode::Hybrid => {
                let semantic = async {
                    match query_embedding {
                        Some(embedding) => store
                            .search_vectors(embedding, user_id, candidate_config)
                            .await
                            .unwrap_or_else(|e| {
                                warn!("semantic search failed: {}", e);
                                Vec::new()
                            }),
                        None => Vec::new(),
                    }
                };
                let lexical = async {
                    store
                        .search_text(query_text, user_id, candidate_config)
                        .await
                        .unwrap_or_else(|e| {
                            warn!("lexical search failed: {}", e);
                            Vec::new()
                        })
                };
                let (semantic, lexical) = tokio::join!(semantic, lexical);

                match config.ranking_method {
                    RankingMethod::Rrf => {
                        reciprocal_rank_fusion(&semantic, &lexical, config.top_k)
                    }
                    RankingMethod::Mmr => {
                        mmr_fusion(&semantic, &lexical, config.mmr_lambda, config.top_k)
                    }
                    RankingMethod::Weighted => weighted_fusion(
                        &semantic,
                        &lexical,
                        config.semantic_weight,
                        config.lexical_weight,
                        config.top_k,
                    )
                    .unwrap_or_else(|e| {
                        warn!("weighted fusion failed ({}), using semantic results", e);
                        let mut fallback = semantic;
                        fallback.truncate(config.top_k);
                        fallback
                    }),
                }
            }
        }
    }

    /// Degraded path: embed the user's stored texts and rank them by cosine
    /// similarity against the query embedding. Returns only real stored
    /// entries, never fabricated results.
    async fn fallback_search(
        &self,
        _query_text: &str,
        query_embedding: Option<&[f32]>,
        user_id: &str,
        config: &VectorSearchConfig,
    ) -> Vec<SearchResult> {
        let Some(query_embedding) = query_embedding else {
            return Vec::new();
        };

        // Prefer the store's listing when available; otherwise the journal
        let mut candidates: Vec<JournalEntry> = Vec::new();
        if let Some(store) = &self.store {
            match store.list_vectors(user_id, 1000, 0).await {
                Ok(listed) if !listed.is_empty() => {
                    candidates = listed
                        .into_iter()
                        .map(|r| JournalEntry {
                            id: r.id,
                            text: r.text,
                        })
                        .collect();
                }
                Ok(_) => {}
                Err(e) => warn!("list_vectors failed in fallback: {}", e),
            }
        }
        if candidates.is_empty() {
            candidates = self
                .journal
                .read()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default();
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        debug!(
            "degraded fallback search over {} stored texts",
            candidates.len()
        );

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_texts_with_fallback(
            self.embedder.clone(),
            &texts,
            self.embedding.batch_size,
            self.embedding.max_concurrent,
        )
        .await;

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .zip(embeddings)
            .filter_map(|(entry, embedding)| {
                let score = cosine_similarity(query_embedding, &embedding);
                if score > 0.0 {
                    let mut result = SearchResult::new(entry.id, entry.text, score);
                    result.semantic_score = Some(score);
                    Some(result)
                } else {
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(config.top_k);
        results
    }

    fn finish(
        &self,
        results: Vec<SearchResult>,
        config: &VectorSearchConfig,
        degraded: bool,
    ) -> SearchOutcome {
        SearchOutcome {
            success: true,
            degraded,
            results: self.rerank_if_configured(results, config),
        }
    }

    fn rerank_if_configured(
        &self,
        results: Vec<SearchResult>,
        config: &VectorSearchConfig,
    ) -> Vec<SearchResult> {
        match &self.reranker {
            Some(reranker) if results.len() > 1 => {
                reranker.rerank_results(results, config.top_k, Some(config.mmr_lambda))
            }
            _ => results,
        }
    }
}
