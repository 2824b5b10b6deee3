//! Markdown-aware chunking
//!
//! Sections are split at heading lines, with fenced code blocks protected
//! from heading detection. Oversized sections are subdivided recursively and
//! each piece keeps its heading text as a contextual prefix.

use super::recursive::RecursiveChunker;
use super::types::{Chunk, ChunkConfig, ChunkStrategy, Metadata};
use regex::Regex;

#[derive(Debug, Clone)]
struct Section {
    /// Heading line (level, title, heading span) when the section has one
    heading: Option<(usize, String, (usize, usize))>,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
pub struct MarkdownChunker {
    config: ChunkConfig,
    heading_re: Regex,
    splitter: RecursiveChunker,
}

impl MarkdownChunker {
    pub fn new(config: ChunkConfig) -> Self {
        let splitter = RecursiveChunker::new(config.clone());
        Self {
            config,
            // Compile-time constant pattern; cannot fail
            heading_re: Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"),
            splitter,
        }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let sections = self.split_sections(text);
        let mut chunks = Vec::new();
        let mut position = 0;

        for section in sections {
            let body = &text[section.start..section.end];
            if body.trim().is_empty() {
                continue;
            }

            if body.len() <= self.config.chunk_size {
                let mut chunk = Chunk::new(
                    body,
                    position,
                    section.start,
                    section.end,
                    ChunkStrategy::MarkdownAware,
                    metadata,
                );
                if let Some((level, title, _)) = &section.heading {
                    chunk = chunk
                        .with_meta("section_title", serde_json::json!(title))
                        .with_meta("heading_level", serde_json::json!(level));
                }
                chunks.push(chunk);
                position += 1;
                continue;
            }

            // Oversized section: split the body below the heading and prefix
            // each piece with the heading for context.
            let (sub_start, prefix) = match &section.heading {
                Some((_, _, (hs, he))) => (*he, Some(text[*hs..*he].trim_end().to_string())),
                None => (section.start, None),
            };

            for (s, e) in self.splitter.split_spans(&text[sub_start..section.end]) {
                let abs_start = sub_start + s;
                let abs_end = sub_start + e;
                let piece = &text[abs_start..abs_end];
                let chunk_text = match &prefix {
                    Some(h) => format!("{}\n\n{}", h, piece.trim_start()),
                    None => piece.to_string(),
                };
                let mut chunk = Chunk::new(
                    chunk_text,
                    position,
                    abs_start,
                    abs_end,
                    ChunkStrategy::MarkdownAware,
                    metadata,
                );
                if let Some((level, title, _)) = &section.heading {
                    chunk = chunk
                        .with_meta("section_title", serde_json::json!(title))
                        .with_meta("heading_level", serde_json::json!(level));
                }
                chunks.push(chunk);
                position += 1;
            }
        }

        // No headings and nothing emitted means the recursive pass saw only
        // blank spans; nothing to do.
        chunks
    }

    /// Split the document into heading-delimited sections. Heading markers
    /// inside fenced code blocks are ignored, which keeps fences whole with
    /// the section that opened them.
    fn split_sections(&self, text: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut in_fence = false;
        let mut current = Section {
            heading: None,
            start: 0,
            end: text.len(),
        };
        let mut cursor = 0;

        for line in text.split_inclusive('\n') {
            let line_start = cursor;
            cursor += line.len();
            let trimmed = line.trim_start();

            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }

            if let Some(caps) = self.heading_re.captures(line.trim_end_matches('\n')) {
                if line_start > current.start || current.heading.is_some() {
                    current.end = line_start;
                    if !text[current.start..current.end].trim().is_empty() {
                        sections.push(current.clone());
                    }
                }
                let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
                let title = caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                current = Section {
                    heading: Some((level, title, (line_start, line_start + line.len()))),
                    start: line_start,
                    end: text.len(),
                };
            }
        }

        current.end = text.len();
        if !text[current.start..current.end].trim().is_empty() {
            sections.push(current);
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize) -> MarkdownChunker {
        MarkdownChunker::new(ChunkConfig {
            chunk_size: size,
            chunk_overlap: 0,
            min_chunk_size: 5,
            ..ChunkConfig::default()
        })
    }

    #[test]
    fn test_sections_by_heading() {
        let text = "# Intro\n\nSome intro text.\n\n# Usage\n\nHow to use it.";
        let chunks = chunker(500).chunk(text, &Metadata::new());
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].metadata.get("section_title").and_then(|v| v.as_str()),
            Some("Intro")
        );
        assert_eq!(
            chunks[1].metadata.get("section_title").and_then(|v| v.as_str()),
            Some("Usage")
        );
    }

    #[test]
    fn test_preamble_without_heading() {
        let text = "Leading prose before any heading.\n\n# First\n\nBody.";
        let chunks = chunker(500).chunk(text, &Metadata::new());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].metadata.get("section_title").is_none());
    }

    #[test]
    fn test_fenced_heading_not_a_section() {
        let text = "# Real\n\n```\n# not a heading\ncode();\n```\n\nAfter fence.";
        let chunks = chunker(500).chunk(text, &Metadata::new());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("# not a heading"));
    }

    #[test]
    fn test_oversized_section_keeps_heading_prefix() {
        let body = "Sentence one here. ".repeat(20);
        let text = format!("# Long Section\n\n{}", body);
        let chunks = chunker(80).chunk(&text, &Metadata::new());
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.starts_with("# Long Section"));
            assert_eq!(
                c.metadata.get("section_title").and_then(|v| v.as_str()),
                Some("Long Section")
            );
        }
    }

    #[test]
    fn test_plain_text_no_headings() {
        let text = "Just plain text without any markdown structure.";
        let chunks = chunker(500).chunk(text, &Metadata::new());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_positions_monotonic() {
        let text = "# A\n\none\n\n# B\n\ntwo\n\n# C\n\nthree";
        let chunks = chunker(500).chunk(text, &Metadata::new());
        for pair in chunks.windows(2) {
            assert!(pair[0].position < pair[1].position);
        }
    }
}
