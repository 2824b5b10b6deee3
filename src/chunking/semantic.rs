//! Similarity-driven chunking
//!
//! The semantic chunker embeds consecutive sentences and starts a new chunk
//! when their cosine similarity drops below the configured threshold. The
//! topic chunker applies the same grouping using lexical word overlap and
//! needs no embedding provider.

use super::sentence::{split_sentence_spans, word_jaccard, word_set, SentenceChunker};
use super::types::{Chunk, ChunkConfig, ChunkStrategy, Metadata};
use crate::embedding::EmbeddingProvider;
use crate::vectordb::fusion::cosine_similarity;
use std::sync::Arc;

pub struct SemanticChunker {
    config: ChunkConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    fallback: SentenceChunker,
}

impl SemanticChunker {
    pub fn new(config: ChunkConfig, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        let fallback = SentenceChunker::new(config.clone());
        Self {
            config,
            embedder,
            fallback,
        }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let embedder = match (&self.embedder, self.config.use_embeddings) {
            (Some(e), true) => e,
            _ => {
                tracing::debug!("semantic chunking without embeddings, using sentence grouping");
                return self.fallback.chunk_tagged(text, metadata, ChunkStrategy::Semantic);
            }
        };

        let spans = split_sentence_spans(text);
        if spans.len() <= 1 {
            return self.fallback.chunk_tagged(text, metadata, ChunkStrategy::Semantic);
        }

        let sentences: Vec<String> = spans.iter().map(|&(s, e)| text[s..e].to_string()).collect();
        let embeddings = match embedder.embed_batch(&sentences) {
            Ok(e) if e.len() == sentences.len() => e,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    "sentence embedding failed, degrading to plain sentence chunking"
                );
                return self.fallback.chunk_tagged(text, metadata, ChunkStrategy::Semantic);
            }
        };

        let mut chunks = Vec::new();
        let mut position = 0;
        let mut group_first = 0usize;

        for i in 1..spans.len() {
            let similarity = cosine_similarity(&embeddings[i - 1], &embeddings[i]);
            let group_len = spans[i - 1].1 - spans[group_first].0;
            let sentence_len = spans[i].1 - spans[i].0;
            let boundary = similarity < self.config.similarity_threshold
                || group_len + sentence_len > self.config.max_chunk_size;

            if boundary {
                let (start, end) = (spans[group_first].0, spans[i - 1].1);
                chunks.push(
                    Chunk::new(
                        &text[start..end],
                        position,
                        start,
                        end,
                        ChunkStrategy::Semantic,
                        metadata,
                    )
                    .with_meta("sentence_count", serde_json::json!(i - group_first)),
                );
                position += 1;
                group_first = i;
            }
        }

        let (start, end) = (spans[group_first].0, spans[spans.len() - 1].1);
        chunks.push(
            Chunk::new(
                &text[start..end],
                position,
                start,
                end,
                ChunkStrategy::Semantic,
                metadata,
            )
            .with_meta("sentence_count", serde_json::json!(spans.len() - group_first)),
        );

        chunks
    }
}

/// Topic chunker: sentence grouping on lexical word overlap
#[derive(Debug, Clone)]
pub struct TopicChunker {
    config: ChunkConfig,
}

impl TopicChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let spans = split_sentence_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let word_sets: Vec<_> = spans.iter().map(|&(s, e)| word_set(&text[s..e])).collect();

        let mut chunks = Vec::new();
        let mut position = 0;
        let mut group_first = 0usize;

        for i in 1..spans.len() {
            let overlap = word_jaccard(&word_sets[i - 1], &word_sets[i]);
            let group_len = spans[i - 1].1 - spans[group_first].0;
            let big_enough = group_len >= self.config.min_chunk_size;
            let boundary = (overlap < self.config.similarity_threshold && big_enough)
                || group_len + (spans[i].1 - spans[i].0) > self.config.chunk_size;

            if boundary {
                let (start, end) = (spans[group_first].0, spans[i - 1].1);
                chunks.push(Chunk::new(
                    &text[start..end],
                    position,
                    start,
                    end,
                    ChunkStrategy::Topic,
                    metadata,
                ));
                position += 1;
                group_first = i;
            }
        }

        let (start, end) = (spans[group_first].0, spans[spans.len() - 1].1);
        chunks.push(Chunk::new(
            &text[start..end],
            position,
            start,
            end,
            ChunkStrategy::Topic,
            metadata,
        ));

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;

    /// Deterministic embedder: a one-hot-ish vector keyed on the first word
    struct KeywordEmbedder;

    impl EmbeddingProvider for KeywordEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut v = vec![0.0f32; 8];
            let key = text
                .split_whitespace()
                .next()
                .map(|w| w.len() % 8)
                .unwrap_or(0);
            v[key] = 1.0;
            Ok(v)
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "keyword-test"
        }
    }

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::GenerationError("down".to_string()))
        }

        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::GenerationError("down".to_string()))
        }

        fn dimension(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "failing-test"
        }
    }

    fn config(threshold: f32) -> ChunkConfig {
        ChunkConfig {
            chunk_size: 200,
            chunk_overlap: 0,
            min_chunk_size: 1,
            max_chunk_size: 500,
            similarity_threshold: threshold,
            ..ChunkConfig::default()
        }
    }

    #[test]
    fn test_similarity_boundary_splits() {
        // "Cats" and "Cats" share an embedding key; "Elephants" differs.
        let text = "Cats are nice. Cats purr often. Elephants are large.";
        let chunker = SemanticChunker::new(config(0.5), Some(Arc::new(KeywordEmbedder)));
        let chunks = chunker.chunk(text, &Metadata::new());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("purr"));
        assert!(chunks[1].text.contains("Elephants"));
    }

    #[test]
    fn test_embed_failure_degrades_to_sentence() {
        let text = "One sentence. Two sentence. Three sentence.";
        let chunker = SemanticChunker::new(config(0.5), Some(Arc::new(FailingEmbedder)));
        let chunks = chunker.chunk(text, &Metadata::new());
        assert!(!chunks.is_empty());
        // Degraded output still reports the requested strategy
        assert_eq!(
            chunks[0].metadata.get("strategy").and_then(|v| v.as_str()),
            Some("semantic")
        );
    }

    #[test]
    fn test_no_embedder_uses_sentence_grouping() {
        let text = "One sentence. Two sentence.";
        let chunker = SemanticChunker::new(config(0.5), None);
        let chunks = chunker.chunk(text, &Metadata::new());
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_topic_chunker_splits_on_vocabulary_shift() {
        let text = "The cat sat quietly. The cat slept deeply. Quantum processors decohere rapidly.";
        let mut cfg = config(0.2);
        cfg.strategy = ChunkStrategy::Topic;
        let chunks = TopicChunker::new(cfg).chunk(text, &Metadata::new());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.contains("Quantum"));
    }

    #[test]
    fn test_empty_input() {
        let chunker = SemanticChunker::new(config(0.5), None);
        assert!(chunker.chunk("  ", &Metadata::new()).is_empty());
        assert!(TopicChunker::new(config(0.5)).chunk("", &Metadata::new()).is_empty());
    }
}
