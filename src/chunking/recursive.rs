//! Recursive separator-cascade chunker

use super::types::{char_floor, Chunk, ChunkConfig, ChunkStrategy, Metadata};

/// Recursive chunker
///
/// Tries separators in priority order; pieces still exceeding `chunk_size`
/// are re-split with the remaining separators, with a hard character split
/// as the final fallback. A post-pass merges adjacent chunks smaller than
/// `min_chunk_size` while the combination still fits `chunk_size`, which
/// prevents pathological tiny trailing chunks.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        self.chunk_tagged(text, metadata, ChunkStrategy::Recursive)
    }

    /// Chunk while tagging output with a caller-supplied strategy; used by
    /// strategies that fall back to recursive splitting
    pub(crate) fn chunk_tagged(
        &self,
        text: &str,
        metadata: &Metadata,
        strategy: ChunkStrategy,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (position, (start, end)) in self.split_spans(text).into_iter().enumerate() {
            chunks.push(Chunk::new(
                &text[start..end],
                position,
                start,
                end,
                strategy,
                metadata,
            ));
        }
        chunks
    }

    /// Produce the span partition without materializing chunks. Spans are
    /// contiguous, in source order, and never blank.
    pub(crate) fn split_spans(&self, text: &str) -> Vec<(usize, usize)> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        self.split_region(text, 0, text.len(), 0, &mut spans);
        let spans = self.merge_small(spans);
        spans
            .into_iter()
            .filter(|&(s, e)| !text[s..e].trim().is_empty())
            .collect()
    }

    /// Split detached text (not a slice of the original input) into owned
    /// pieces; offsets are not meaningful to the caller
    pub(crate) fn split_text_owned(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|(s, e)| text[s..e].to_string())
            .collect()
    }

    fn split_region(
        &self,
        text: &str,
        start: usize,
        end: usize,
        sep_idx: usize,
        out: &mut Vec<(usize, usize)>,
    ) {
        if end - start <= self.config.chunk_size {
            out.push((start, end));
            return;
        }

        if sep_idx >= self.config.separators.len() {
            self.hard_split(text, start, end, out);
            return;
        }

        let sep = &self.config.separators[sep_idx];
        let region = &text[start..end];

        // Separator stays attached to the preceding part so spans partition
        // the region exactly.
        let mut parts: Vec<(usize, usize)> = Vec::new();
        let mut cursor = start;
        for (idx, _) in region.match_indices(sep.as_str()) {
            let part_end = start + idx + sep.len();
            if part_end > cursor {
                parts.push((cursor, part_end));
                cursor = part_end;
            }
        }
        if cursor < end {
            parts.push((cursor, end));
        }

        if parts.len() <= 1 {
            self.split_region(text, start, end, sep_idx + 1, out);
            return;
        }

        let mut cur_start: Option<usize> = None;
        let mut cur_end = start;

        for (ps, pe) in parts {
            if pe - ps > self.config.chunk_size {
                if let Some(cs) = cur_start.take() {
                    out.push((cs, cur_end));
                }
                self.split_region(text, ps, pe, sep_idx + 1, out);
                continue;
            }

            match cur_start {
                None => {
                    cur_start = Some(ps);
                    cur_end = pe;
                }
                Some(cs) => {
                    if pe - cs <= self.config.chunk_size {
                        cur_end = pe;
                    } else {
                        out.push((cs, cur_end));
                        cur_start = Some(ps);
                        cur_end = pe;
                    }
                }
            }
        }

        if let Some(cs) = cur_start {
            out.push((cs, cur_end));
        }
    }

    /// Final fallback: hard character windows within `[start, end)`
    fn hard_split(&self, text: &str, start: usize, end: usize, out: &mut Vec<(usize, usize)>) {
        let mut s = start;
        while s < end {
            let mut e = char_floor(text, (s + self.config.chunk_size).min(end));
            if e <= s {
                e = text[s..]
                    .chars()
                    .next()
                    .map(|c| s + c.len_utf8())
                    .unwrap_or(end)
                    .min(end);
                if e <= s {
                    break;
                }
            }
            out.push((s, e));
            s = e;
        }
    }

    /// Merge adjacent small chunks while the combination fits `chunk_size`
    fn merge_small(&self, spans: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
        let mut merged: Vec<(usize, usize)> = Vec::new();
        for (s, e) in spans {
            if let Some(last) = merged.last_mut() {
                let either_small = (e - s) < self.config.min_chunk_size
                    || (last.1 - last.0) < self.config.min_chunk_size;
                if either_small && last.1 == s && (e - last.0) <= self.config.chunk_size {
                    last.1 = e;
                    continue;
                }
            }
            merged.push((s, e));
        }
        merged
    }
}
