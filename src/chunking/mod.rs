//! Multi-strategy text chunking
//!
//! Raw text is split into [`Chunk`]s by one of a closed set of strategies,
//! selected through [`ChunkingService`]. Every strategy honors the same
//! contract: empty input produces empty output, malformed input degrades to
//! a simpler strategy instead of failing, and output positions are strictly
//! increasing in source order.

mod basic;
mod code;
mod hierarchical;
mod hybrid;
mod markdown;
mod recursive;
mod semantic;
mod sentence;
mod service;
mod structured;
mod token;
mod types;

pub use basic::{FixedSizeChunker, SlidingWindowChunker};
pub use code::CodeChunker;
pub use hierarchical::HierarchicalChunker;
pub use hybrid::HybridChunker;
pub use markdown::MarkdownChunker;
pub use recursive::RecursiveChunker;
pub use semantic::{SemanticChunker, TopicChunker};
pub use sentence::{ParagraphChunker, SentenceChunker};
pub use service::ChunkingService;
pub use structured::{ConversationChunker, JsonChunker, TableChunker};
pub use token::TokenBasedChunker;
pub use types::{derive_chunk_id, Chunk, ChunkConfig, ChunkError, ChunkStrategy, Metadata};

use crate::embedding::EmbeddingProvider;
use std::sync::Arc;

/// The closed set of chunker variants behind one `chunk` capability
pub enum Chunker {
    FixedSize(FixedSizeChunker),
    SlidingWindow(SlidingWindowChunker),
    Sentence(SentenceChunker),
    Paragraph(ParagraphChunker),
    Topic(TopicChunker),
    Recursive(RecursiveChunker),
    Markdown(MarkdownChunker),
    Code(CodeChunker),
    Semantic(SemanticChunker),
    Token(TokenBasedChunker),
    Hierarchical(HierarchicalChunker),
    Table(TableChunker),
    Conversation(ConversationChunker),
    Json(JsonChunker),
    Hybrid(HybridChunker),
}

impl Chunker {
    /// Build the chunker variant for a strategy. The configuration's
    /// `strategy` field is overridden to match.
    pub fn build(
        strategy: ChunkStrategy,
        config: &ChunkConfig,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let mut config = config.clone();
        config.strategy = strategy;
        // Topic boundaries are Jaccard overlap, which sits far below cosine
        // similarity for the same "same topic" judgement.
        if strategy == ChunkStrategy::Topic && config.similarity_threshold > 0.5 {
            config.similarity_threshold = 0.15;
        }

        match strategy {
            ChunkStrategy::FixedSize => Self::FixedSize(FixedSizeChunker::new(config)),
            ChunkStrategy::SlidingWindow => Self::SlidingWindow(SlidingWindowChunker::new(config)),
            ChunkStrategy::Sentence => Self::Sentence(SentenceChunker::new(config)),
            ChunkStrategy::Paragraph => Self::Paragraph(ParagraphChunker::new(config)),
            ChunkStrategy::Topic => Self::Topic(TopicChunker::new(config)),
            ChunkStrategy::Recursive => Self::Recursive(RecursiveChunker::new(config)),
            ChunkStrategy::MarkdownAware => Self::Markdown(MarkdownChunker::new(config)),
            ChunkStrategy::CodeAware => Self::Code(CodeChunker::new(config)),
            ChunkStrategy::Semantic => Self::Semantic(SemanticChunker::new(config, embedder)),
            ChunkStrategy::TokenBased => Self::Token(TokenBasedChunker::new(config)),
            ChunkStrategy::Hierarchical => Self::Hierarchical(HierarchicalChunker::new(config)),
            ChunkStrategy::TableAware => Self::Table(TableChunker::new(config)),
            ChunkStrategy::ConversationAware => {
                Self::Conversation(ConversationChunker::new(config))
            }
            ChunkStrategy::JsonAware => Self::Json(JsonChunker::new(config)),
            ChunkStrategy::Hybrid => Self::Hybrid(HybridChunker::new(config)),
        }
    }

    /// Split text into chunks, merging `metadata` into every produced chunk.
    /// Never fails; malformed input degrades per strategy.
    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        match self {
            Self::FixedSize(c) => c.chunk(text, metadata),
            Self::SlidingWindow(c) => c.chunk(text, metadata),
            Self::Sentence(c) => c.chunk(text, metadata),
            Self::Paragraph(c) => c.chunk(text, metadata),
            Self::Topic(c) => c.chunk(text, metadata),
            Self::Recursive(c) => c.chunk(text, metadata),
            Self::Markdown(c) => c.chunk(text, metadata),
            Self::Code(c) => c.chunk(text, metadata),
            Self::Semantic(c) => c.chunk(text, metadata),
            Self::Token(c) => c.chunk(text, metadata),
            Self::Hierarchical(c) => c.chunk(text, metadata),
            Self::Table(c) => c.chunk(text, metadata),
            Self::Conversation(c) => c.chunk(text, metadata),
            Self::Json(c) => c.chunk(text, metadata),
            Self::Hybrid(c) => c.chunk(text, metadata),
        }
    }
}

#[cfg(test)]
mod chunker_tests {
    use super::*;

    #[test]
    fn test_every_strategy_handles_empty_input() {
        let strategies = [
            ChunkStrategy::FixedSize,
            ChunkStrategy::Sentence,
            ChunkStrategy::Recursive,
            ChunkStrategy::MarkdownAware,
            ChunkStrategy::CodeAware,
            ChunkStrategy::Semantic,
            ChunkStrategy::TokenBased,
            ChunkStrategy::Hierarchical,
            ChunkStrategy::Hybrid,
            ChunkStrategy::Paragraph,
            ChunkStrategy::Topic,
            ChunkStrategy::SlidingWindow,
            ChunkStrategy::TableAware,
            ChunkStrategy::ConversationAware,
            ChunkStrategy::JsonAware,
        ];
        let config = ChunkConfig::default();
        for strategy in strategies {
            let chunker = Chunker::build(strategy, &config, None);
            assert!(
                chunker.chunk("", &Metadata::new()).is_empty(),
                "strategy {:?} produced chunks for empty input",
                strategy
            );
        }
    }

    #[test]
    fn test_every_strategy_produces_output_for_text() {
        let text = "First sentence of the document. Second sentence follows it. Third sentence closes the paragraph.\n\nA second paragraph adds more content for the chunkers to work with.";
        let config = ChunkConfig::default();
        let strategies = [
            ChunkStrategy::FixedSize,
            ChunkStrategy::Sentence,
            ChunkStrategy::Recursive,
            ChunkStrategy::MarkdownAware,
            ChunkStrategy::CodeAware,
            ChunkStrategy::Semantic,
            ChunkStrategy::TokenBased,
            ChunkStrategy::Hierarchical,
            ChunkStrategy::Hybrid,
            ChunkStrategy::Paragraph,
            ChunkStrategy::Topic,
            ChunkStrategy::SlidingWindow,
            ChunkStrategy::TableAware,
            ChunkStrategy::ConversationAware,
            ChunkStrategy::JsonAware,
        ];
        for strategy in strategies {
            let chunker = Chunker::build(strategy, &config, None);
            let chunks = chunker.chunk(text, &Metadata::new());
            assert!(
                !chunks.is_empty(),
                "strategy {:?} produced no chunks",
                strategy
            );
            for pair in chunks.windows(2) {
                assert!(pair[0].position < pair[1].position);
            }
        }
    }
}
