//! Token-count chunking
//!
//! Tokenizer availability is resolved once at construction: when a
//! tokenizer file loads, chunk boundaries come from real token offsets;
//! otherwise a 4-characters-per-token approximation is used and the
//! fallback is logged so inexact offsets are traceable.

use super::types::{char_floor, Chunk, ChunkConfig, ChunkStrategy, Metadata};
use tokenizers::Tokenizer;

/// Characters per token assumed by the approximation path
const CHARS_PER_TOKEN: usize = 4;

enum TokenizerCapability {
    Exact(Box<Tokenizer>),
    Approximate,
}

pub struct TokenBasedChunker {
    config: ChunkConfig,
    capability: TokenizerCapability,
}

impl TokenBasedChunker {
    pub fn new(config: ChunkConfig) -> Self {
        let capability = match &config.tokenizer_file {
            Some(path) => match Tokenizer::from_file(path) {
                Ok(tokenizer) => {
                    tracing::debug!("token chunker using tokenizer from {:?}", path);
                    TokenizerCapability::Exact(Box::new(tokenizer))
                }
                Err(e) => {
                    tracing::warn!(
                        "failed to load tokenizer from {:?}: {}; using {} chars/token approximation",
                        path,
                        e,
                        CHARS_PER_TOKEN
                    );
                    TokenizerCapability::Approximate
                }
            },
            None => {
                tracing::debug!(
                    "no tokenizer configured, token chunking uses {} chars/token approximation",
                    CHARS_PER_TOKEN
                );
                TokenizerCapability::Approximate
            }
        };

        Self { config, capability }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match &self.capability {
            TokenizerCapability::Exact(tokenizer) => match tokenizer.encode(text, false) {
                Ok(encoding) => self.chunk_exact(text, metadata, encoding.get_offsets()),
                Err(e) => {
                    tracing::warn!("tokenization failed ({}), using approximation", e);
                    self.chunk_approximate(text, metadata)
                }
            },
            TokenizerCapability::Approximate => self.chunk_approximate(text, metadata),
        }
    }

    fn overlap_tokens(&self) -> usize {
        (self.config.chunk_overlap / CHARS_PER_TOKEN).min(self.config.token_limit.saturating_sub(1))
    }

    fn chunk_exact(
        &self,
        text: &str,
        metadata: &Metadata,
        offsets: &[(usize, usize)],
    ) -> Vec<Chunk> {
        let offsets: Vec<(usize, usize)> = offsets
            .iter()
            .copied()
            .filter(|&(s, e)| e > s && e <= text.len())
            .collect();
        if offsets.is_empty() {
            return self.chunk_approximate(text, metadata);
        }

        let limit = self.config.token_limit.max(1);
        let step = limit.saturating_sub(self.overlap_tokens()).max(1);

        let mut chunks = Vec::new();
        let mut position = 0;
        let mut first = 0usize;

        while first < offsets.len() {
            let last = (first + limit).min(offsets.len()) - 1;
            let start = char_floor(text, offsets[first].0);
            let end = char_floor(text, offsets[last].1).max(start);
            let piece = &text[start..end];
            if !piece.trim().is_empty() {
                chunks.push(
                    Chunk::new(piece, position, start, end, ChunkStrategy::TokenBased, metadata)
                        .with_meta("token_count", serde_json::json!(last - first + 1))
                        .with_meta("token_counting", serde_json::json!("exact")),
                );
                position += 1;
            }
            if last + 1 >= offsets.len() {
                break;
            }
            first += step;
        }

        chunks
    }

    fn chunk_approximate(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        let window = self.config.token_limit.max(1) * CHARS_PER_TOKEN;
        let overlap = self.overlap_tokens() * CHARS_PER_TOKEN;

        let mut chunks = Vec::new();
        let mut position = 0;
        let mut start = 0;

        while start < text.len() {
            let mut end = char_floor(text, (start + window).min(text.len()));
            if end <= start {
                end = text[start..]
                    .chars()
                    .next()
                    .map(|c| start + c.len_utf8())
                    .unwrap_or(text.len());
            }

            let piece = &text[start..end];
            if !piece.trim().is_empty() {
                chunks.push(
                    Chunk::new(piece, position, start, end, ChunkStrategy::TokenBased, metadata)
                        .with_meta(
                            "token_count",
                            serde_json::json!(piece.len().div_ceil(CHARS_PER_TOKEN)),
                        )
                        .with_meta("token_counting", serde_json::json!("approximate")),
                );
                position += 1;
            }

            if end >= text.len() {
                break;
            }
            let mut next = char_floor(text, end.saturating_sub(overlap));
            if next <= start {
                next = end;
            }
            start = next;
        }

        chunks
    }
}
