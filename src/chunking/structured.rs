//! Structure-preserving chunkers: JSON documents, markdown tables, and
//! conversation transcripts
//!
//! Malformed input never fails a chunker; it falls back to recursive
//! splitting instead.

use super::recursive::RecursiveChunker;
use super::sentence::split_sentence_spans;
use super::types::{Chunk, ChunkConfig, ChunkStrategy, Metadata};
use regex::Regex;

/// JSON-aware chunker: one chunk per top-level object key, grouped array
/// elements, or a single chunk for scalars
pub struct JsonChunker {
    config: ChunkConfig,
    fallback: RecursiveChunker,
}

impl JsonChunker {
    pub fn new(config: ChunkConfig) -> Self {
        let fallback = RecursiveChunker::new(config.clone());
        Self { config, fallback }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("invalid JSON input ({}), falling back to recursive chunking", e);
                return self.fallback.chunk(text, metadata);
            }
        };

        let mut chunks = match value {
            serde_json::Value::Object(map) if !map.is_empty() => {
                let mut chunks = Vec::new();
                let mut position = 0;
                for (key, val) in map {
                    let rendered = serde_json::to_string_pretty(&val)
                        .unwrap_or_else(|_| val.to_string());
                    let body = format!("\"{}\": {}", key, rendered);
                    // Best-effort source offsets: locate the key in the raw text
                    let needle = format!("\"{}\"", key);
                    let start = text.find(&needle).unwrap_or(0);
                    let end = (start + body.len()).min(text.len());
                    chunks.push(
                        Chunk::new(body, position, start, end, ChunkStrategy::JsonAware, metadata)
                            .with_meta("json_pointer", serde_json::json!(format!("/{}", key))),
                    );
                    position += 1;
                }
                chunks
            }
            serde_json::Value::Array(items) if !items.is_empty() => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|v| serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
                    .collect();

                let mut chunks = Vec::new();
                let mut position = 0;
                let mut group: Vec<usize> = Vec::new();
                let mut group_len = 0usize;

                let flush =
                    |group: &mut Vec<usize>, group_len: &mut usize, position: &mut usize,
                     chunks: &mut Vec<Chunk>| {
                        if group.is_empty() {
                            return;
                        }
                        let first = group[0];
                        let last = group[group.len() - 1];
                        let body = group
                            .iter()
                            .map(|&i| rendered[i].as_str())
                            .collect::<Vec<_>>()
                            .join(",\n");
                        chunks.push(
                            Chunk::new(
                                body,
                                *position,
                                0,
                                text.len(),
                                ChunkStrategy::JsonAware,
                                metadata,
                            )
                            .with_meta(
                                "json_range",
                                serde_json::json!(format!("[{}..={}]", first, last)),
                            ),
                        );
                        *position += 1;
                        group.clear();
                        *group_len = 0;
                    };

                for (i, r) in rendered.iter().enumerate() {
                    if !group.is_empty() && group_len + r.len() > self.config.chunk_size {
                        flush(&mut group, &mut group_len, &mut position, &mut chunks);
                    }
                    group_len += r.len();
                    group.push(i);
                }
                flush(&mut group, &mut group_len, &mut position, &mut chunks);
                chunks
            }
            _ => {
                // Scalars and empty containers carry no splittable structure
                tracing::debug!("degenerate JSON value, falling back to recursive chunking");
                return self.fallback.chunk(text, metadata);
            }
        };

        // Oversized per-key chunks are rare but possible; leave them whole
        // only up to max_chunk_size.
        let mut position = 0;
        let mut bounded = Vec::new();
        for chunk in chunks.drain(..) {
            if chunk.text.len() <= self.config.max_chunk_size {
                let mut c = chunk;
                c.position = position;
                position += 1;
                bounded.push(c);
            } else {
                for sub in self.fallback.split_text_owned(&chunk.text) {
                    let mut c = Chunk::new(
                        sub,
                        position,
                        chunk.start_char,
                        chunk.end_char,
                        ChunkStrategy::JsonAware,
                        metadata,
                    );
                    if let Some(ptr) = chunk.metadata.get("json_pointer") {
                        c.metadata.insert("json_pointer".to_string(), ptr.clone());
                    }
                    position += 1;
                    bounded.push(c);
                }
            }
        }
        bounded
    }
}

/// Table-aware chunker: markdown tables are kept whole, surrounding prose is
/// split recursively
pub struct TableChunker {
    config: ChunkConfig,
    fallback: RecursiveChunker,
    separator_re: Regex,
}

impl TableChunker {
    pub fn new(config: ChunkConfig) -> Self {
        let fallback = RecursiveChunker::new(config.clone());
        Self {
            config,
            fallback,
            separator_re: Regex::new(r"^\s*\|?[\s:|-]+\|[\s:|-]*$").expect("valid separator regex"),
        }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let tables = self.table_regions(text);
        if tables.is_empty() {
            return self.fallback.chunk_tagged(text, metadata, ChunkStrategy::TableAware);
        }

        let mut chunks = Vec::new();
        let mut position = 0;
        let mut cursor = 0;

        for (ts, te) in tables {
            if ts > cursor && !text[cursor..ts].trim().is_empty() {
                for (s, e) in self.fallback.split_spans(&text[cursor..ts]) {
                    chunks.push(Chunk::new(
                        &text[cursor + s..cursor + e],
                        position,
                        cursor + s,
                        cursor + e,
                        ChunkStrategy::TableAware,
                        metadata,
                    ));
                    position += 1;
                }
            }

            self.emit_table(text, ts, te, metadata, &mut position, &mut chunks);
            cursor = te;
        }

        if cursor < text.len() && !text[cursor..].trim().is_empty() {
            for (s, e) in self.fallback.split_spans(&text[cursor..]) {
                chunks.push(Chunk::new(
                    &text[cursor + s..cursor + e],
                    position,
                    cursor + s,
                    cursor + e,
                    ChunkStrategy::TableAware,
                    metadata,
                ));
                position += 1;
            }
        }

        chunks
    }

    /// Emit a table region, splitting by rows with a repeated header when it
    /// exceeds `max_chunk_size`
    fn emit_table(
        &self,
        text: &str,
        ts: usize,
        te: usize,
        metadata: &Metadata,
        position: &mut usize,
        chunks: &mut Vec<Chunk>,
    ) {
        let table = &text[ts..te];
        if table.len() <= self.config.max_chunk_size {
            chunks.push(
                Chunk::new(table, *position, ts, te, ChunkStrategy::TableAware, metadata)
                    .with_meta("contains_table", serde_json::json!(true)),
            );
            *position += 1;
            return;
        }

        let mut lines: Vec<(usize, usize)> = Vec::new();
        let mut cursor = ts;
        for line in table.split_inclusive('\n') {
            lines.push((cursor, cursor + line.len()));
            cursor += line.len();
        }
        if lines.len() < 3 {
            chunks.push(
                Chunk::new(table, *position, ts, te, ChunkStrategy::TableAware, metadata)
                    .with_meta("contains_table", serde_json::json!(true)),
            );
            *position += 1;
            return;
        }

        let header = &text[lines[0].0..lines[1].1];
        let mut first = 2usize;
        while first < lines.len() {
            let mut last = first;
            while last + 1 < lines.len()
                && header.len() + (lines[last + 1].1 - lines[first].0) <= self.config.chunk_size
            {
                last += 1;
            }
            let rows = &text[lines[first].0..lines[last].1];
            chunks.push(
                Chunk::new(
                    format!("{}{}", header, rows),
                    *position,
                    lines[first].0,
                    lines[last].1,
                    ChunkStrategy::TableAware,
                    metadata,
                )
                .with_meta("contains_table", serde_json::json!(true))
                .with_meta("table_continuation", serde_json::json!(first > 2)),
            );
            *position += 1;
            first = last + 1;
        }
    }

    /// Byte ranges of markdown table blocks: a header row, a separator row,
    /// and any following rows, all containing `|`
    fn table_regions(&self, text: &str) -> Vec<(usize, usize)> {
        let mut lines: Vec<(usize, usize)> = Vec::new();
        let mut cursor = 0;
        for line in text.split_inclusive('\n') {
            lines.push((cursor, cursor + line.len()));
            cursor += line.len();
        }

        let mut regions = Vec::new();
        let mut i = 0;
        while i + 1 < lines.len() {
            let first = text[lines[i].0..lines[i].1].trim_end();
            let second = text[lines[i + 1].0..lines[i + 1].1].trim_end();
            if first.contains('|') && second.contains('-') && self.separator_re.is_match(second) {
                let start = lines[i].0;
                let mut j = i + 2;
                while j < lines.len() && text[lines[j].0..lines[j].1].contains('|') {
                    j += 1;
                }
                regions.push((start, lines[j - 1].1));
                i = j;
            } else {
                i += 1;
            }
        }
        regions
    }
}

/// Conversation-aware chunker: groups speaker turns without ever splitting
/// inside one
pub struct ConversationChunker {
    config: ChunkConfig,
    fallback: RecursiveChunker,
    turn_re: Regex,
}

impl ConversationChunker {
    pub fn new(config: ChunkConfig) -> Self {
        let fallback = RecursiveChunker::new(config.clone());
        Self {
            config,
            fallback,
            turn_re: Regex::new(r"(?m)^([A-Za-z][A-Za-z0-9_ ]{0,24}):[ \t]").expect("valid turn regex"),
        }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let turns: Vec<(usize, String)> = self
            .turn_re
            .captures_iter(text)
            .filter_map(|caps| {
                let m = caps.get(0)?;
                let speaker = caps.get(1)?.as_str().trim().to_string();
                Some((m.start(), speaker))
            })
            .collect();

        if turns.len() < 2 {
            tracing::debug!("no conversation turns detected, falling back to recursive chunking");
            return self.fallback.chunk(text, metadata);
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut position = 0;
        let mut group_first = 0usize;

        let turn_end =
            |i: usize| -> usize { turns.get(i + 1).map(|t| t.0).unwrap_or(text.len()) };

        let flush = |first: usize, last: usize, position: &mut usize, chunks: &mut Vec<Chunk>| {
            let start = turns[first].0;
            let end = turn_end(last);
            let speakers: Vec<&str> = {
                let mut seen = Vec::new();
                for t in &turns[first..=last] {
                    if !seen.contains(&t.1.as_str()) {
                        seen.push(t.1.as_str());
                    }
                }
                seen
            };
            chunks.push(
                Chunk::new(
                    text[start..end].trim_end(),
                    *position,
                    start,
                    end,
                    ChunkStrategy::ConversationAware,
                    metadata,
                )
                .with_meta("turn_count", serde_json::json!(last - first + 1))
                .with_meta("speakers", serde_json::json!(speakers)),
            );
            *position += 1;
        };

        for i in 0..turns.len() {
            let group_len = turn_end(i) - turns[group_first].0;
            let single_turn_len = turn_end(i) - turns[i].0;

            if i > group_first && group_len > self.config.chunk_size {
                flush(group_first, i - 1, &mut position, &mut chunks);
                group_first = i;
            }

            // An oversized single turn gets its own chunk, split by sentence
            // only past max_chunk_size
            if single_turn_len > self.config.max_chunk_size {
                if i > group_first {
                    flush(group_first, i - 1, &mut position, &mut chunks);
                }
                let (ts, te) = (turns[i].0, turn_end(i));
                let body = &text[ts..te];
                let sentence_spans = split_sentence_spans(body);
                if sentence_spans.len() > 1 {
                    let mut s_first = 0usize;
                    while s_first < sentence_spans.len() {
                        let mut s_last = s_first;
                        while s_last + 1 < sentence_spans.len()
                            && sentence_spans[s_last + 1].1 - sentence_spans[s_first].0
                                <= self.config.chunk_size
                        {
                            s_last += 1;
                        }
                        let (bs, be) =
                            (sentence_spans[s_first].0, sentence_spans[s_last].1);
                        chunks.push(
                            Chunk::new(
                                &body[bs..be],
                                position,
                                ts + bs,
                                ts + be,
                                ChunkStrategy::ConversationAware,
                                metadata,
                            )
                            .with_meta("turn_count", serde_json::json!(1))
                            .with_meta("speakers", serde_json::json!([turns[i].1.as_str()])),
                        );
                        position += 1;
                        s_first = s_last + 1;
                    }
                } else {
                    flush(i, i, &mut position, &mut chunks);
                }
                group_first = i + 1;
            }
        }

        if group_first < turns.len() {
            flush(group_first, turns.len() - 1, &mut position, &mut chunks);
        }

        chunks
    }
}
