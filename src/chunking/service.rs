//! Chunking service: strategy registry and dispatch
//!
//! The service maps a strategy selector to a chunker variant, caching
//! built chunkers per strategy. Unknown strategy names fall back to
//! recursive chunking with a warning; chunking is best-effort and never
//! fails a call over a selector typo.

use super::types::{ChunkError, Metadata};
use super::{Chunk, ChunkConfig, ChunkStrategy, Chunker};
use crate::embedding::EmbeddingProvider;
use ahash::AHashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;

pub struct ChunkingService {
    defaults: ChunkConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    /// Chunker cache keyed by strategy; purely an optimization and safe to
    /// rebuild at any time
    cache: RwLock<AHashMap<ChunkStrategy, Arc<Chunker>>>,
}

impl ChunkingService {
    /// Create a service with the given default configuration. Invalid
    /// configurations (overlap not smaller than size) fail fast.
    pub fn new(defaults: ChunkConfig) -> Result<Self, ChunkError> {
        defaults.validate()?;
        Ok(Self {
            defaults,
            embedder: None,
            cache: RwLock::new(AHashMap::new()),
        })
    }

    /// Attach an embedding provider, enabling embedding-driven semantic
    /// chunking
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Chunk text with a strategy selected by name. Unknown names fall back
    /// to recursive chunking with a logged warning.
    pub fn chunk_text(
        &self,
        text: &str,
        strategy_name: &str,
        metadata: Option<Metadata>,
    ) -> Vec<Chunk> {
        let strategy = self.resolve_strategy(strategy_name);
        self.chunk_with_strategy(text, strategy, metadata)
    }

    /// Chunk text with an already-resolved strategy
    pub fn chunk_with_strategy(
        &self,
        text: &str,
        strategy: ChunkStrategy,
        metadata: Option<Metadata>,
    ) -> Vec<Chunk> {
        let meta = metadata.unwrap_or_default();
        self.chunker_for(strategy).chunk(text, &meta)
    }

    /// Chunk text with a caller-supplied configuration, bypassing the
    /// chunker cache. The configuration is validated first.
    pub fn chunk_with_config(
        &self,
        text: &str,
        config: &ChunkConfig,
        metadata: Option<Metadata>,
    ) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        let chunker = Chunker::build(config.strategy, config, self.embedder.clone());
        let meta = metadata.unwrap_or_default();
        Ok(chunker.chunk(text, &meta))
    }

    /// Read a file, infer its content type from the extension, and chunk it
    /// with file metadata (`source`, `file_extension`, `file_size`) attached
    pub async fn chunk_document(
        &self,
        path: &Path,
        strategy_name: &str,
    ) -> Result<Vec<Chunk>, ChunkError> {
        if !path.exists() {
            return Err(ChunkError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ChunkError::Io {
                source: e,
                context: format!("Failed to read document: {:?}", path),
            })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let content_type = match extension.as_str() {
            "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "rb" | "sh" => "code",
            "md" | "markdown" => "markdown",
            _ => "plain",
        };

        let mut metadata = Metadata::new();
        metadata.insert(
            "source".to_string(),
            serde_json::json!(path.display().to_string()),
        );
        metadata.insert("file_extension".to_string(), serde_json::json!(extension));
        metadata.insert("file_size".to_string(), serde_json::json!(content.len()));
        metadata.insert("content_type".to_string(), serde_json::json!(content_type));

        Ok(self.chunk_text(&content, strategy_name, Some(metadata)))
    }

    /// Chunk many texts with bounded concurrency. One failing or empty text
    /// yields an empty chunk list for that slot and never aborts the batch;
    /// result order matches input order.
    pub async fn chunk_batch(
        &self,
        texts: &[String],
        strategy_name: &str,
        max_concurrent: usize,
    ) -> Vec<Vec<Chunk>> {
        let strategy = self.resolve_strategy(strategy_name);
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let futures = texts.iter().enumerate().map(|(index, text)| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.ok();
                if text.trim().is_empty() {
                    tracing::debug!("batch item {} is empty, producing no chunks", index);
                    return Vec::new();
                }
                self.chunk_with_strategy(text, strategy, None)
            }
        });

        futures::future::join_all(futures).await
    }

    /// Heuristic strategy auto-selection: code keywords, then markdown
    /// markers, then many short lines, then long-document semantics, and
    /// recursive otherwise
    pub fn optimal_strategy(&self, text: &str) -> ChunkStrategy {
        let code_hits: usize = ["def ", "function ", "class ", "import ", "fn ", "pub fn "]
            .iter()
            .map(|k| text.matches(k).count())
            .sum();
        if code_hits >= 2 {
            return ChunkStrategy::CodeAware;
        }

        if text.contains("# ") || text.contains("```") || text.contains("**") {
            return ChunkStrategy::MarkdownAware;
        }

        let line_count = text.lines().count();
        if line_count > 20 {
            let avg_line = text.len() / line_count;
            if avg_line < 30 {
                return ChunkStrategy::Hierarchical;
            }
        }

        if text.len() > 5000 {
            return ChunkStrategy::Semantic;
        }

        ChunkStrategy::Recursive
    }

    fn resolve_strategy(&self, name: &str) -> ChunkStrategy {
        match ChunkStrategy::parse(name) {
            Some(s) => s,
            None => {
                tracing::warn!(
                    "unknown chunking strategy '{}', falling back to recursive",
                    name
                );
                ChunkStrategy::Recursive
            }
        }
    }

    fn chunker_for(&self, strategy: ChunkStrategy) -> Arc<Chunker> {
        if let Some(chunker) = self.cache.read().unwrap().get(&strategy) {
            return chunker.clone();
        }

        let chunker = Arc::new(Chunker::build(
            strategy,
            &self.defaults,
            self.embedder.clone(),
        ));
        self.cache
            .write()
            .unwrap()
            .insert(strategy, chunker.clone());
        chunker
    }
}
