//! Configuration management for mnemo
//!
//! Process-level defaults for chunking, retrieval, embedding, and the local
//! index backend. Loaded from TOML with environment-variable overrides and
//! validated before use; per-call `ChunkConfig` / `VectorSearchConfig`
//! values are derived from these defaults.

use crate::chunking::{ChunkConfig, ChunkStrategy};
use crate::error::{MnemoError, Result};
use crate::vectordb::{RankingMethod, SearchMode, VectorSearchConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

/// Chunking defaults applied when a caller does not supply a `ChunkConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Default strategy name; unknown names fall back to "recursive"
    pub default_strategy: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    /// Cap on in-flight chunking operations in `chunk_batch`
    pub max_concurrent: usize,
    /// Optional HuggingFace tokenizer file for exact token counting
    pub tokenizer_file: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            default_strategy: "recursive".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 4000,
            max_concurrent: 8,
            tokenizer_file: None,
        }
    }
}

/// Retrieval defaults for hybrid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub search_mode: SearchMode,
    pub ranking_method: RankingMethod,
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    pub mmr_lambda: f32,
    /// Multiplier applied to `top_k` when fetching fusion candidates
    pub search_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            search_mode: SearchMode::Hybrid,
            ranking_method: RankingMethod::Rrf,
            semantic_weight: 0.7,
            lexical_weight: 0.3,
            mmr_lambda: 0.5,
            search_multiplier: 3,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    /// Cap on concurrent embedding batches
    pub max_concurrent: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
            max_concurrent: 4,
        }
    }
}

/// Local index backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub vector_dim: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_search: usize,
    /// Directory for the on-disk keyword index; in-memory when unset
    pub keyword_index_dir: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            hnsw_ef_construction: 200,
            hnsw_m: 16,
            hnsw_ef_search: 50,
            keyword_index_dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MnemoError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MnemoError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MnemoError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Default configuration file location (`<config_dir>/mnemo/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mnemo").join("config.toml"))
    }

    /// Apply environment variable overrides
    /// Environment variables in format: MNEMO_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("MNEMO_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_usize = |v: &str| {
            v.parse::<usize>()
                .map_err(|e| MnemoError::Config(format!("invalid integer '{}': {}", v, e)))
        };
        let parse_f32 = |v: &str| {
            v.parse::<f32>()
                .map_err(|e| MnemoError::Config(format!("invalid float '{}': {}", v, e)))
        };

        match key {
            "CHUNKING__DEFAULT_STRATEGY" => self.chunking.default_strategy = value.to_string(),
            "CHUNKING__CHUNK_SIZE" => self.chunking.chunk_size = parse_usize(value)?,
            "CHUNKING__CHUNK_OVERLAP" => self.chunking.chunk_overlap = parse_usize(value)?,
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_usize(value)?,
            "RETRIEVAL__SEMANTIC_WEIGHT" => self.retrieval.semantic_weight = parse_f32(value)?,
            "RETRIEVAL__LEXICAL_WEIGHT" => self.retrieval.lexical_weight = parse_f32(value)?,
            "RETRIEVAL__MMR_LAMBDA" => self.retrieval.mmr_lambda = parse_f32(value)?,
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_usize(value)?,
            "INDEX__VECTOR_DIM" => self.index.vector_dim = parse_usize(value)?,
            _ => {
                return Err(MnemoError::Config(format!(
                    "Unknown configuration key: {}",
                    key
                )))
            }
        }
        Ok(())
    }

    /// Derive a per-call chunking configuration from the defaults
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            strategy: ChunkStrategy::parse(&self.chunking.default_strategy)
                .unwrap_or(ChunkStrategy::Recursive),
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            min_chunk_size: self.chunking.min_chunk_size,
            max_chunk_size: self.chunking.max_chunk_size,
            tokenizer_file: self.chunking.tokenizer_file.clone(),
            ..ChunkConfig::default()
        }
    }

    /// Derive a per-query search configuration from the defaults
    pub fn search_config(&self) -> VectorSearchConfig {
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
}
