//! mnemo - hybrid semantic/lexical search engine
//!
//! A multi-strategy text chunking pipeline feeding a pluggable vector-store
//! abstraction, with rank-fusion retrieval (RRF, weighted, MMR), a
//! standalone diversity-aware reranker, and a tiered hybrid-search
//! orchestrator that degrades gracefully when backends misbehave.

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod vectordb;

pub use chunking::{Chunk, ChunkConfig, ChunkStrategy, ChunkingService};
pub use config::Config;
pub use embedding::{EmbeddingProvider, FastEmbedProvider};
pub use error::{MnemoError, Result};
pub use retrieval::{HybridSearchService, MmrReranker, RerankConfig};
pub use vectordb::{
    InMemoryVectorStore, LocalVectorStore, RankingMethod, SearchMode, SearchResult,
    VectorSearchConfig, VectorStore,
};
