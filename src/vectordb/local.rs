//! Local vector store: HNSW ANN index + tantivy BM25 index + an in-process
//! payload table
//!
//! The payload table is the source of truth; both indices address records
//! through an internal numeric ID. HNSW is append-only, so deletions remove
//! the payload and the keyword entry, and stale ANN hits are dropped during
//! hydration.

use super::keyword_index::KeywordIndex;
use super::store::{StoreError, VectorStore};
use super::types::{matches_filter, SearchResult, StoreStats, VectorSearchConfig};
use super::vector_index::{HnswParams, VectorIndex};
use crate::chunking::Metadata;
use ahash::AHashMap;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Payload {
    id: String,
    user_id: String,
    text: String,
    embedding: Vec<f32>,
    metadata: Metadata,
    sequence: u64,
}

/// Tuning for the local backend
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub dimension: usize,
    pub hnsw: HnswParams,
    /// HNSW ef parameter at query time
    pub ef_search: usize,
    /// Directory for the keyword index; in-memory when unset
    pub keyword_index_dir: Option<PathBuf>,
}

impl LocalStoreConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            hnsw: HnswParams::default(),
            ef_search: 50,
            keyword_index_dir: None,
        }
    }
}

/// [`VectorStore`] backed by local HNSW and tantivy indices
pub struct LocalVectorStore {
    config: LocalStoreConfig,
    vectors: VectorIndex,
    keywords: Mutex<KeywordIndex>,
    payloads: RwLock<AHashMap<u64, Payload>>,
    ids: RwLock<AHashMap<(String, String), u64>>,
    next_id: AtomicU64,
}

impl LocalVectorStore {
    pub fn new(config: LocalStoreConfig) -> Result<Self, StoreError> {
        let keywords = match &config.keyword_index_dir {
            Some(dir) => KeywordIndex::on_disk(dir.clone()),
            None => KeywordIndex::in_memory(),
        }
        .map_err(|e| StoreError::Index(e.to_string()))?;

        let vectors = VectorIndex::new(config.dimension, config.hnsw);

        Ok(Self {
            config,
            vectors,
            keywords: Mutex::new(keywords),
            payloads: RwLock::new(AHashMap::new()),
            ids: RwLock::new(AHashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), StoreError> {
        if embedding.len() != self.config.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    fn to_result(payload: &Payload, score: f32, include_embedding: bool) -> SearchResult {
        let mut result = SearchResult::new(payload.id.clone(), payload.text.clone(), score)
            .with_metadata(payload.metadata.clone());
        if include_embedding {
            result.embedding = Some(payload.embedding.clone());
        }
        result
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn store_vector(
        &self,
        id: &str,
        text: &str,
        embedding: &[f32],
        user_id: &str,
        metadata: Option<Metadata>,
    ) -> Result<bool, StoreError> {
        if id.is_empty() || user_id.is_empty() {
            return Err(StoreError::InvalidInput(
                "id and user_id must be non-empty".to_string(),
            ));
        }
        self.check_dimension(embedding)?;

        let mut metadata = metadata.unwrap_or_default();
        metadata.insert("user_id".to_string(), serde_json::json!(user_id));
        metadata.insert(
            "stored_at".to_string(),
            serde_json::json!(chrono::Utc::now().to_rfc3339()),
        );

        let key = (user_id.to_string(), id.to_string());
        let numeric = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Upsert: retire any previous record under this key. The old ANN
        // entry stays in the graph but is dropped at hydration.
        let replaced = {
            let mut ids = self.ids.write().unwrap();
            let old = ids.insert(key, numeric);
            if let Some(old_numeric) = old {
                self.payloads.write().unwrap().remove(&old_numeric);
            }
            old
        };

        self.vectors
            .insert(numeric, embedding)
            .map_err(|e| StoreError::Index(e.to_string()))?;

        {
            let mut keywords = self.keywords.lock().await;
            if let Some(old_numeric) = replaced {
                keywords.delete(old_numeric);
            }
            keywords
                .insert(numeric, user_id, text)
                .map_err(|e| StoreError::Index(e.to_string()))?;
            keywords
                .commit()
                .map_err(|e| StoreError::Index(e.to_string()))?;
        }

        self.payloads.write().unwrap().insert(
            numeric,
            Payload {
                id: id.to_string(),
                user_id: user_id.to_string(),
                text: text.to_string(),
                embedding: embedding.to_vec(),
                metadata,
                sequence: numeric,
            },
        );

        Ok(true)
    }

    async fn search_vectors(
        &self,
        query_embedding: &[f32],
        user_id: &str,
        config: &VectorSearchConfig,
    ) -> Result<Vec<SearchResult>, StoreError> {
        self.check_dimension(query_embedding)?;

        // Over-fetch: ANN cannot pre-filter by tenant, so grab extra
        // candidates and filter during hydration.
        let fetch = config.top_k * 4 + 16;
        let hits = self
            .vectors
            .search(query_embedding, fetch, self.config.ef_search)
            .map_err(|e| StoreError::Index(e.to_string()))?;

        let payloads = self.payloads.read().unwrap();
        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| payloads.get(&hit.id).map(|p| (p, hit.score)))
            .filter(|(p, _)| p.user_id == user_id)
            .filter(|(p, _)| matches_filter(Some(&p.metadata), config.filter_metadata.as_ref()))
            .map(|(p, score)| {
                let mut result = Self::to_result(p, score, config.include_embeddings);
                result.semantic_score = Some(score);
                result
            })
            .collect();

        results.truncate(config.top_k);
        Ok(results)
    }

    async fn search_text(
        &self,
        query_text: &str,
        user_id: &str,
        config: &VectorSearchConfig,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let hits = {
            let keywords = self.keywords.lock().await;
            keywords
                .search(query_text, user_id, config.top_k * 2)
                .map_err(|e| StoreError::Index(e.to_string()))?
        };

        let payloads = self.payloads.read().unwrap();
        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| payloads.get(&hit.id).map(|p| (p, hit.score)))
            .filter(|(p, _)| p.user_id == user_id)
            .filter(|(p, _)| matches_filter(Some(&p.metadata), config.filter_metadata.as_ref()))
            .map(|(p, score)| {
                let mut result = Self::to_result(p, score, config.include_embeddings);
                result.lexical_score = Some(score);
                result
            })
            .collect();

        results.truncate(config.top_k);
        Ok(results)
    }

    async fn delete_vector(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let key = (user_id.to_string(), id.to_string());
        let numeric = { self.ids.write().unwrap().remove(&key) };

        let Some(numeric) = numeric else {
            return Ok(false);
        };

        self.payloads.write().unwrap().remove(&numeric);

        let mut keywords = self.keywords.lock().await;
        keywords.delete(numeric);
        keywords
            .commit()
            .map_err(|e| StoreError::Index(e.to_string()))?;

        Ok(true)
    }

    async fn get_vector(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<SearchResult>, StoreError> {
        let key = (user_id.to_string(), id.to_string());
        let numeric = { self.ids.read().unwrap().get(&key).copied() };
        let Some(numeric) = numeric else {
            return Ok(None);
        };

        let payloads = self.payloads.read().unwrap();
        Ok(payloads
            .get(&numeric)
            .filter(|p| p.user_id == user_id)
            .map(|p| Self::to_result(p, 1.0, true)))
    }

    async fn list_vectors(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let payloads = self.payloads.read().unwrap();
        let mut owned: Vec<&Payload> = payloads
            .values()
            .filter(|p| p.user_id == user_id)
            .collect();
        owned.sort_by_key(|p| p.sequence);

        Ok(owned
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|p| Self::to_result(p, 1.0, false))
            .collect())
    }

    async fn get_stats(&self, user_id: &str) -> Result<StoreStats, StoreError> {
        let payloads = self.payloads.read().unwrap();
        let vector_count = payloads.values().filter(|p| p.user_id == user_id).count();
        Ok(StoreStats {
            backend: "local-hnsw-tantivy".to_string(),
            vector_count,
            dimension: Some(self.config.dimension),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LocalVectorStore {
        LocalVectorStore::new(LocalStoreConfig::new(4)).unwrap()
    }

    fn unit(hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[hot] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_store_search_roundtrip() {
        let s = store();
        s.store_vector("a", "rust borrow checker", &unit(0), "u1", None)
            .await
            .unwrap();
        s.store_vector("b", "java garbage collector", &unit(1), "u1", None)
            .await
            .unwrap();

        let results = s
            .search_vectors(&unit(0), "u1", &VectorSearchConfig::default())
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "a");

        let results = s
            .search_text("garbage collector", "u1", &VectorSearchConfig::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let s = store();
        s.store_vector("a", "private note", &unit(0), "u1", None)
            .await
            .unwrap();

        assert!(s.get_vector("a", "u2").await.unwrap().is_none());
        assert!(!s.delete_vector("a", "u2").await.unwrap());
        assert!(s
            .search_vectors(&unit(0), "u2", &VectorSearchConfig::default())
            .await
            .unwrap()
            .is_empty());
        assert!(s
            .search_text("private", "u2", &VectorSearchConfig::default())
            .await
            .unwrap()
            .is_empty());
        assert!(s.get_vector("a", "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dimension_rejected() {
        let s = store();
        let result = s
            .store_vector("a", "text", &[1.0, 0.0], "u1", None)
            .await;
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn test_delete_removes_from_both_indices() {
        let s = store();
        s.store_vector("a", "ephemeral entry", &unit(0), "u1", None)
            .await
            .unwrap();
        assert!(s.delete_vector("a", "u1").await.unwrap());

        assert!(s.get_vector("a", "u1").await.unwrap().is_none());
        assert!(s
            .search_text("ephemeral", "u1", &VectorSearchConfig::default())
            .await
            .unwrap()
            .is_empty());
        // The stale ANN entry is filtered out during hydration
        assert!(s
            .search_vectors(&unit(0), "u1", &VectorSearchConfig::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let s = store();
        s.store_vector("a", "old text", &unit(0), "u1", None)
            .await
            .unwrap();
        s.store_vector("a", "new text", &unit(1), "u1", None)
            .await
            .unwrap();

        let got = s.get_vector("a", "u1").await.unwrap().unwrap();
        assert_eq!(got.text, "new text");

        let stats = s.get_stats("u1").await.unwrap();
        assert_eq!(stats.vector_count, 1);

        let hits = s
            .search_text("old", "u1", &VectorSearchConfig::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_search_on_local_backend() {
        let s = store();
        s.store_vector("a", "hybrid search with rank fusion", &unit(0), "u1", None)
            .await
            .unwrap();
        s.store_vector("b", "completely unrelated cooking recipe", &unit(2), "u1", None)
            .await
            .unwrap();

        let results = s
            .hybrid_search(
                "rank fusion",
                &unit(0),
                "u1",
                &VectorSearchConfig::default(),
            )
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "a");
    }
}
