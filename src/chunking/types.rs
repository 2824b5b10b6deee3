//! Chunk model and chunking configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Free-form metadata attached to chunks and search results
pub type Metadata = HashMap<String, serde_json::Value>;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Invalid chunk configuration: {0}")]
    InvalidConfig(String),

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },
}

/// Available chunking strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    FixedSize,
    Sentence,
    Recursive,
    MarkdownAware,
    CodeAware,
    Semantic,
    TokenBased,
    Hierarchical,
    Hybrid,
    Paragraph,
    Topic,
    SlidingWindow,
    TableAware,
    ConversationAware,
    JsonAware,
}

impl ChunkStrategy {
    /// Parse a strategy name; returns `None` for unknown names so callers
    /// can apply their own fallback rule
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fixed_size" | "fixed" => Some(Self::FixedSize),
            "sentence" => Some(Self::Sentence),
            "recursive" => Some(Self::Recursive),
            "markdown_aware" | "markdown" => Some(Self::MarkdownAware),
            "code_aware" | "code" => Some(Self::CodeAware),
            "semantic" => Some(Self::Semantic),
            "token_based" | "token" => Some(Self::TokenBased),
            "hierarchical" => Some(Self::Hierarchical),
            "hybrid" => Some(Self::Hybrid),
            "paragraph" => Some(Self::Paragraph),
            "topic" => Some(Self::Topic),
            "sliding_window" => Some(Self::SlidingWindow),
            "table_aware" | "table" => Some(Self::TableAware),
            "conversation_aware" | "conversation" => Some(Self::ConversationAware),
            "json_aware" | "json" => Some(Self::JsonAware),
            _ => None,
        }
    }

    /// Canonical strategy name, written into chunk metadata
    pub fn name(self) -> &'static str {
        match self {
            Self::FixedSize => "fixed_size",
            Self::Sentence => "sentence",
            Self::Recursive => "recursive",
            Self::MarkdownAware => "markdown_aware",
            Self::CodeAware => "code_aware",
            Self::Semantic => "semantic",
            Self::TokenBased => "token_based",
            Self::Hierarchical => "hierarchical",
            Self::Hybrid => "hybrid",
            Self::Paragraph => "paragraph",
            Self::Topic => "topic",
            Self::SlidingWindow => "sliding_window",
            Self::TableAware => "table_aware",
            Self::ConversationAware => "conversation_aware",
            Self::JsonAware => "json_aware",
        }
    }
}

/// Configuration for one chunking invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub strategy: ChunkStrategy,
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters; must be smaller
    /// than `chunk_size`
    pub chunk_overlap: usize,
    /// Chunks below this size are merged with a neighbor where possible
    pub min_chunk_size: usize,
    /// Hard upper bound applied by strategies that emit structural units
    pub max_chunk_size: usize,
    /// Ordered separator fallback list for the recursive strategy
    pub separators: Vec<String>,
    /// Boundary threshold for the semantic and topic strategies
    pub similarity_threshold: f32,
    /// Whether the semantic strategy may call the embedding provider
    pub use_embeddings: bool,
    /// Token budget per chunk for the token-based strategy
    pub token_limit: usize,
    /// Tree depth for the hierarchical strategy
    pub hierarchy_levels: usize,
    /// Optional HuggingFace tokenizer file for exact token counting
    pub tokenizer_file: Option<PathBuf>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Recursive,
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 4000,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                " ".to_string(),
            ],
            similarity_threshold: 0.7,
            use_embeddings: true,
            token_limit: 512,
            hierarchy_levels: 3,
            tokenizer_file: None,
        }
    }
}

impl ChunkConfig {
    /// Build a config for a specific strategy with default parameters
    pub fn for_strategy(strategy: ChunkStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Fail fast on configurations that would silently degrade
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_chunk_size > self.max_chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "min_chunk_size ({}) exceeds max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        Ok(())
    }

    /// Window advance for stride-based strategies; always at least 1
    pub(crate) fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

/// A unit of segmented text with its position in the source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text content
    pub text: String,
    /// Free-form metadata; always carries `strategy`, `position`, `created_at`
    pub metadata: Metadata,
    /// Deterministic ID derived from position and a content hash
    pub chunk_id: String,
    /// Parent chunk for hierarchical strategies
    pub parent_id: Option<String>,
    /// Ordered child chunks for hierarchical strategies
    pub children_ids: Vec<String>,
    /// Zero-based sequence index within one chunking run
    pub position: usize,
    /// Byte offset into the original input text
    pub start_char: usize,
    /// Byte offset into the original input text (exclusive)
    pub end_char: usize,
    /// Embedding vector, populated after embedding generation
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a chunk with the standard metadata keys populated
    pub fn new(
        text: impl Into<String>,
        position: usize,
        start_char: usize,
        end_char: usize,
        strategy: ChunkStrategy,
        base_metadata: &Metadata,
    ) -> Self {
        let text = text.into();
        let mut metadata = base_metadata.clone();
        metadata.insert(
            "strategy".to_string(),
            serde_json::Value::String(strategy.name().to_string()),
        );
        metadata.insert("position".to_string(), serde_json::json!(position));
        metadata.insert(
            "created_at".to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );

        Self {
            chunk_id: derive_chunk_id(position, &text),
            text,
            metadata,
            parent_id: None,
            children_ids: Vec::new(),
            position,
            start_char,
            end_char,
            embedding: None,
        }
    }

    /// Attach an extra metadata key, consuming and returning the chunk
    pub fn with_meta(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Derive a chunk ID from `(position, content_hash)`. Stable for identical
/// input and position; not globally unique across re-chunking runs.
pub fn derive_chunk_id(position: usize, text: &str) -> String {
    let hash = blake3::hash(text.as_bytes());
    format!("{}-{}", position, &hash.to_hex()[..16])
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary
pub(crate) fn char_floor(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
