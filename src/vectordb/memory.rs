//! In-memory vector store
//!
//! Reference backend and test double: brute-force cosine similarity for the
//! semantic leg and token-overlap scoring for the lexical leg, with full
//! tenant isolation. The collection dimension locks in on the first stored
//! vector and every later write or query must match it.

use super::fusion::{cosine_similarity, jaccard, token_set};
use super::store::{StoreError, VectorStore};
use super::types::{matches_filter, SearchResult, StoreStats, VectorSearchConfig};
use crate::chunking::Metadata;
use ahash::AHashMap;
use async_trait::async_trait;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    text: String,
    embedding: Vec<f32>,
    metadata: Metadata,
    sequence: u64,
}

/// In-memory [`VectorStore`] implementation
pub struct InMemoryVectorStore {
    /// Records keyed by `(user_id, id)`; the composite key makes tenant
    /// isolation structural rather than a filter
    records: RwLock<AHashMap<(String, String), StoredRecord>>,
    dimension: RwLock<Option<usize>>,
    counter: RwLock<u64>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(AHashMap::new()),
            dimension: RwLock::new(None),
            counter: RwLock::new(0),
        }
    }

    /// Create a store with the collection dimension fixed up front
    pub fn with_dimension(dimension: usize) -> Self {
        let store = Self::new();
        *store.dimension.write().unwrap() = Some(dimension);
        store
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), StoreError> {
        let mut dimension = self.dimension.write().unwrap();
        match *dimension {
            Some(expected) if expected != embedding.len() => Err(StoreError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            }),
            Some(_) => Ok(()),
            None => {
                *dimension = Some(embedding.len());
                Ok(())
            }
        }
    }

    fn to_result(record: &StoredRecord, score: f32, include_embedding: bool) -> SearchResult {
        let mut result = SearchResult::new(record.id.clone(), record.text.clone(), score)
            .with_metadata(record.metadata.clone());
        if include_embedding {
            result.embedding = Some(record.embedding.clone());
        }
        result
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
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

        let sequence = {
            let mut counter = self.counter.write().unwrap();
            *counter += 1;
            *counter
        };

        self.records.write().unwrap().insert(
            (user_id.to_string(), id.to_string()),
            StoredRecord {
                id: id.to_string(),
                text: text.to_string(),
                embedding: embedding.to_vec(),
                metadata,
                sequence,
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
        if let Some(expected) = *self.dimension.read().unwrap() {
            if expected != query_embedding.len() {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: query_embedding.len(),
                });
            }
        }

        let records = self.records.read().unwrap();
        let mut scored: Vec<SearchResult> = records
            .iter()
            .filter(|((user, _), _)| user.as_str() == user_id)
            .filter(|(_, record)| {
                matches_filter(Some(&record.metadata), config.filter_metadata.as_ref())
            })
            .map(|(_, record)| {
                let score = cosine_similarity(query_embedding, &record.embedding);
                let mut result = Self::to_result(record, score, config.include_embeddings);
                result.semantic_score = Some(score);
                result
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(config.top_k);
        Ok(scored)
    }

    async fn search_text(
        &self,
        query_text: &str,
        user_id: &str,
        config: &VectorSearchConfig,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let query_tokens = token_set(query_text);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.records.read().unwrap();
        let mut scored: Vec<SearchResult> = records
            .iter()
            .filter(|((user, _), _)| user.as_str() == user_id)
            .filter(|(_, record)| {
                matches_filter(Some(&record.metadata), config.filter_metadata.as_ref())
            })
            .filter_map(|(_, record)| {
                let score = jaccard(&query_tokens, &token_set(&record.text));
                if score > 0.0 {
                    let mut result = Self::to_result(record, score, config.include_embeddings);
                    result.lexical_score = Some(score);
                    Some(result)
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(config.top_k);
        Ok(scored)
    }

    async fn delete_vector(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .records
            .write()
            .unwrap()
            .remove(&(user_id.to_string(), id.to_string()));
        Ok(removed.is_some())
    }

    async fn get_vector(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<SearchResult>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records
            .get(&(user_id.to_string(), id.to_string()))
            .map(|record| Self::to_result(record, 1.0, true)))
    }

    async fn list_vectors(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let records = self.records.read().unwrap();
        let mut owned: Vec<&StoredRecord> = records
            .iter()
            .filter(|((user, _), _)| user.as_str() == user_id)
            .map(|(_, record)| record)
            .collect();
        owned.sort_by_key(|record| record.sequence);

        Ok(owned
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|record| Self::to_result(record, 1.0, false))
            .collect())
    }

    async fn get_stats(&self, user_id: &str) -> Result<StoreStats, StoreError> {
        let records = self.records.read().unwrap();
        let vector_count = records.keys().filter(|(user, _)| user.as_str() == user_id).count();
        Ok(StoreStats {
            backend: "in-memory".to_string(),
            vector_count,
            dimension: *self.dimension.read().unwrap(),
        })
    }
}
