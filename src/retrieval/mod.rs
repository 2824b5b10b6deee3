//! Hybrid retrieval and diversity-aware reranking
//!
//! [`HybridSearchService`] orchestrates chunking, embedding, storage, and
//! tiered retrieval; [`MmrReranker`] re-selects an already-scored result
//! list for diversity and is usable on its own.

mod hybrid;
mod reranker;

pub use hybrid::{HybridSearchService, SearchError, SearchOutcome, StoreOutcome};
pub use reranker::{MmrReranker, RerankConfig};
