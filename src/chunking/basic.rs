//! Window-based chunkers: fixed-size with word-boundary breaks, and a plain
//! sliding window

use super::types::{char_floor, Chunk, ChunkConfig, ChunkStrategy, Metadata};

/// Fixed-size chunker
///
/// Slides a `chunk_size` window over the text, preferring to break at the
/// last space inside a lookback region so words are not split. Consecutive
/// chunks overlap by `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    config: ChunkConfig,
}

impl FixedSizeChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let size = self.config.chunk_size;
        let lookback = (size / 3).clamp(4, 64);
        let mut chunks = Vec::new();
        let mut position = 0;
        let mut start = 0;

        while start < text.len() {
            let hard_end = char_floor(text, (start + size).min(text.len()));
            let mut end = hard_end;

            if hard_end < text.len() {
                let window_start = char_floor(text, hard_end.saturating_sub(lookback)).max(start);
                if let Some(rel) = text[window_start..hard_end].rfind(' ') {
                    let candidate = window_start + rel;
                    if candidate > start {
                        end = candidate;
                    }
                }
            }

            if end <= start {
                end = advance_one_char(text, start);
            }

            let piece = &text[start..end];
            if !piece.trim().is_empty() {
                chunks.push(Chunk::new(
                    piece,
                    position,
                    start,
                    end,
                    ChunkStrategy::FixedSize,
                    metadata,
                ));
                position += 1;
            }

            if end >= text.len() {
                break;
            }

            // Advance relative to the realized break point so overlap is
            // measured against the emitted chunk, not the hard window.
            let mut next = char_floor(text, end.saturating_sub(self.config.chunk_overlap));
            if next <= start {
                next = end;
            }
            start = next;
        }

        chunks
    }
}

/// Sliding-window chunker
///
/// Pure `chunk_size` window advanced by `chunk_size - chunk_overlap`, with
/// no word-boundary preference. Useful when uniform spans matter more than
/// clean breaks.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    config: ChunkConfig,
}

impl SlidingWindowChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut position = 0;
        let mut start = 0;

        while start < text.len() {
            let mut end = char_floor(text, (start + self.config.chunk_size).min(text.len()));
            if end <= start {
                end = advance_one_char(text, start);
            }

            let piece = &text[start..end];
            if !piece.trim().is_empty() {
                chunks.push(Chunk::new(
                    piece,
                    position,
                    start,
                    end,
                    ChunkStrategy::SlidingWindow,
                    metadata,
                ));
                position += 1;
            }

            if end >= text.len() {
                break;
            }

            let mut next = char_floor(text, start + self.config.stride());
            if next <= start {
                next = end;
            }
            start = next;
        }

        chunks
    }
}

/// Step past at least one full character from `start`
fn advance_one_char(text: &str, start: usize) -> usize {
    text[start..]
        .chars()
        .next()
        .map(|c| start + c.len_utf8())
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            chunk_size: size,
            chunk_overlap: overlap,
            ..ChunkConfig::default()
        }
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = FixedSizeChunker::new(config(10, 0));
        assert!(chunker.chunk("", &Metadata::new()).is_empty());
        assert!(chunker.chunk("   \n ", &Metadata::new()).is_empty());
    }

    #[test]
    fn test_small_input_single_chunk() {
        let chunker = FixedSizeChunker::new(config(100, 10));
        let chunks = chunker.chunk("short text", &Metadata::new());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 10);
    }

    #[test]
    fn test_word_boundary_break() {
        let text = "alpha bravo charlie delta";
        let chunker = FixedSizeChunker::new(config(12, 0));
        let chunks = chunker.chunk(text, &Metadata::new());
        assert!(chunks.len() >= 2);
        // Every break lands on a space, so no word is split
        for chunk in &chunks {
            assert!(
                chunk.end_char == text.len() || text.as_bytes()[chunk.end_char] == b' ',
                "chunk split mid-word: {:?}",
                chunk.text
            );
        }
    }

    #[test]
    fn test_positions_monotonic() {
        let chunker = SlidingWindowChunker::new(config(8, 2));
        let chunks = chunker.chunk("abcdefghijklmnopqrstuvwxyz", &Metadata::new());
        for pair in chunks.windows(2) {
            assert!(pair[0].position < pair[1].position);
            assert!(pair[0].start_char < pair[1].start_char);
        }
    }

    #[test]
    fn test_sliding_window_coverage() {
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";
        let chunker = SlidingWindowChunker::new(config(10, 3));
        let chunks = chunker.chunk(text, &Metadata::new());

        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks.last().map(|c| c.end_char), Some(text.len()));
        for pair in chunks.windows(2) {
            assert!(
                pair[1].start_char <= pair[0].end_char,
                "gap between consecutive chunks"
            );
        }
    }

    #[test]
    fn test_overlap_bounded() {
        let text = "one two three four five six seven eight nine ten";
        let chunker = FixedSizeChunker::new(config(16, 4));
        let chunks = chunker.chunk(text, &Metadata::new());
        for pair in chunks.windows(2) {
            let dup = pair[0].end_char.saturating_sub(pair[1].start_char);
            assert!(dup <= 4, "overlap {} exceeds configured 4", dup);
        }
    }

    #[test]
    fn test_multibyte_text_never_panics() {
        let text = "héllo wörld ünïcode téxt — ça marche 日本語のテキスト";
        let chunker = FixedSizeChunker::new(config(7, 2));
        let chunks = chunker.chunk(text, &Metadata::new());
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert_eq!(&text[c.start_char..c.end_char], c.text);
        }
    }
}
