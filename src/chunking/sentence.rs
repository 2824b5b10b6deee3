//! Sentence-boundary chunking and paragraph merging

use super::types::{Chunk, ChunkConfig, ChunkStrategy, Metadata};
use ahash::AHashSet;

/// Split text into sentence spans (byte offsets into the input).
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace and a capital
/// letter, digit, or non-ASCII character, or at CJK terminal punctuation
/// (`。` `！` `？`). Trailing text without terminal punctuation forms a final
/// sentence. Spans are trimmed of surrounding whitespace.
pub(crate) fn split_sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let (bi, c) = chars[i];
        if start.is_none() && !c.is_whitespace() {
            start = Some(bi);
        }

        let terminal_cjk = matches!(c, '。' | '！' | '？');
        let terminal_latin = matches!(c, '.' | '!' | '?');

        if let Some(s) = start {
            if terminal_cjk || terminal_latin {
                // Absorb closing quotes/brackets into the sentence
                let mut k = i + 1;
                let mut end = bi + c.len_utf8();
                while k < chars.len() && matches!(chars[k].1, '"' | '\'' | ')' | ']') {
                    end = chars[k].0 + chars[k].1.len_utf8();
                    k += 1;
                }

                let boundary = if terminal_cjk {
                    true
                } else if k >= chars.len() {
                    true
                } else if chars[k].1.is_whitespace() {
                    let mut j = k;
                    while j < chars.len() && chars[j].1.is_whitespace() {
                        j += 1;
                    }
                    j >= chars.len()
                        || chars[j].1.is_uppercase()
                        || chars[j].1.is_numeric()
                        || !chars[j].1.is_ascii()
                } else {
                    false
                };

                if boundary {
                    spans.push((s, end));
                    start = None;
                    i = k;
                    continue;
                }
            }
        }
        i += 1;
    }

    if let Some(s) = start {
        let end = text.trim_end().len();
        if end > s {
            spans.push((s, end));
        }
    }

    spans
}

/// Lowercased alphanumeric token set, used for topic-shift heuristics
pub(crate) fn word_set(text: &str) -> AHashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Jaccard similarity over two token sets; 0.0 when both are empty
pub(crate) fn word_jaccard(a: &AHashSet<String>, b: &AHashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f32 / union as f32
}

/// Sentence chunker
///
/// Accumulates whole sentences until the size budget is reached, then
/// flushes. `chunk_overlap` is a character budget: trailing sentences within
/// that budget are repeated at the start of the next chunk for context
/// continuity.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        self.chunk_tagged(text, metadata, ChunkStrategy::Sentence)
    }

    /// Chunk while tagging output with a caller-supplied strategy; used by
    /// strategies that degrade to sentence chunking
    pub(crate) fn chunk_tagged(
        &self,
        text: &str,
        metadata: &Metadata,
        strategy: ChunkStrategy,
    ) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let spans = split_sentence_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        // A sentence's budget includes one joining separator, so sentences
        // that would only just reach the size limit still start a new chunk.
        let budget = |idx: usize| -> usize { spans[idx].1 - spans[idx].0 + 1 };

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut position = 0;
        let mut current: Vec<usize> = Vec::new();
        let mut current_len = 0usize;

        let flush = |indices: &[usize], position: &mut usize, chunks: &mut Vec<Chunk>| {
            if indices.is_empty() {
                return;
            }
            let start = spans[indices[0]].0;
            let end = spans[indices[indices.len() - 1]].1;
            chunks.push(
                Chunk::new(&text[start..end], *position, start, end, strategy, metadata)
                    .with_meta("sentence_count", serde_json::json!(indices.len())),
            );
            *position += 1;
        };

        for idx in 0..spans.len() {
            let span_len = budget(idx);
            if !current.is_empty() && current_len + span_len >= self.config.chunk_size {
                flush(&current, &mut position, &mut chunks);

                // Carry trailing sentences within the overlap budget
                let mut carried = Vec::new();
                let mut carry_len = 0usize;
                for &i in current.iter().rev() {
                    let l = budget(i);
                    if carry_len + l > self.config.chunk_overlap {
                        break;
                    }
                    carried.push(i);
                    carry_len += l;
                }
                carried.reverse();
                current = carried;
                current_len = carry_len;
            }
            current.push(idx);
            current_len += span_len;
        }

        flush(&current, &mut position, &mut chunks);
        chunks
    }
}

/// Paragraph chunker
///
/// Merges consecutive paragraphs into chunks up to `chunk_size`, starting a
/// new chunk early when the lexical overlap between adjacent paragraphs
/// signals a topic shift.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    config: ChunkConfig,
}

/// Word-overlap below this between adjacent paragraphs is treated as a
/// topic boundary
const TOPIC_SHIFT_JACCARD: f32 = 0.1;

impl ParagraphChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let paragraphs = paragraph_spans(text);
        if paragraphs.is_empty() {
            return Vec::new();
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut position = 0;
        let mut group_start: Option<usize> = None;
        let mut group_end = 0usize;
        let mut prev_words: Option<AHashSet<String>> = None;

        for &(ps, pe) in &paragraphs {
            let words = word_set(&text[ps..pe]);
            let topic_shift = prev_words
                .as_ref()
                .map(|prev| word_jaccard(prev, &words) < TOPIC_SHIFT_JACCARD)
                .unwrap_or(false);

            let too_big = group_start
                .map(|gs| pe - gs > self.config.chunk_size)
                .unwrap_or(false);
            let split_here = too_big
                || (topic_shift
                    && group_start
                        .map(|gs| group_end - gs >= self.config.min_chunk_size)
                        .unwrap_or(false));

            if split_here {
                if let Some(gs) = group_start.take() {
                    chunks.push(Chunk::new(
                        &text[gs..group_end],
                        position,
                        gs,
                        group_end,
                        ChunkStrategy::Paragraph,
                        metadata,
                    ));
                    position += 1;
                }
            }

            if group_start.is_none() {
                group_start = Some(ps);
            }
            group_end = pe;
            prev_words = Some(words);
        }

        if let Some(gs) = group_start {
            chunks.push(Chunk::new(
                &text[gs..group_end],
                position,
                gs,
                group_end,
                ChunkStrategy::Paragraph,
                metadata,
            ));
        }

        chunks
    }
}

/// Paragraph spans split on blank lines, trimmed, excluding empty paragraphs
pub(crate) fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for part in text.split("\n\n") {
        let raw_start = cursor;
        cursor += part.len() + 2;
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lead = part.len() - part.trim_start().len();
        let start = raw_start + lead;
        spans.push((start, start + trimmed.len()));
    }
    spans
}
