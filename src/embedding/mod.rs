//! Embedding generation: the provider contract and batch helpers

mod batch;
mod provider;

pub use batch::{embed_chunks, embed_texts_with_fallback};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
