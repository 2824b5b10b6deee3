//! Code-aware chunking
//!
//! Detects the language from structural keywords, splits at function/class
//! boundaries found by per-language regexes, and falls back to line-aware
//! chunking for preambles, oversized units, and unrecognized languages.
//! Overlap is expressed in trailing lines rather than characters.

use super::types::{Chunk, ChunkConfig, ChunkStrategy, Metadata};
use regex::Regex;

/// Characters per line assumed when converting `chunk_overlap` into a
/// trailing-line count
const CHARS_PER_LINE: usize = 80;

struct LanguageProfile {
    name: &'static str,
    keywords: &'static [&'static str],
    boundary: Regex,
}

pub struct CodeChunker {
    config: ChunkConfig,
    profiles: Vec<LanguageProfile>,
}

impl CodeChunker {
    pub fn new(config: ChunkConfig) -> Self {
        let compile = |p: &str| Regex::new(p).expect("valid boundary regex");
        let profiles = vec![
            LanguageProfile {
                name: "rust",
                keywords: &["fn ", "impl ", "pub ", "let mut ", "::"],
                boundary: compile(
                    r"(?m)^\s*(?:pub(?:\(crate\))?\s+)?(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|impl|mod)\b",
                ),
            },
            LanguageProfile {
                name: "python",
                keywords: &["def ", "import ", "self.", "elif "],
                boundary: compile(r"(?m)^(?:async\s+)?def\s+\w+|^class\s+\w+"),
            },
            LanguageProfile {
                name: "javascript",
                keywords: &["function ", "const ", "=> ", "var "],
                boundary: compile(
                    r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\b|^\s*(?:export\s+)?class\s+\w+",
                ),
            },
            LanguageProfile {
                name: "go",
                keywords: &["func ", "package ", ":= "],
                boundary: compile(r"(?m)^func\s+|^type\s+\w+\s+(?:struct|interface)\b"),
            },
            LanguageProfile {
                name: "java",
                keywords: &["public class ", "void ", "System.out", "private "],
                boundary: compile(
                    r"(?m)^\s*(?:public|private|protected)\s+(?:static\s+)?(?:final\s+)?[\w<>\[\]]+\s+\w+\s*\(|^\s*(?:public\s+)?(?:abstract\s+)?(?:final\s+)?class\s+\w+",
                ),
            },
        ];
        Self { config, profiles }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let profile = self.detect_language(text);
        let language = profile.map(|p| p.name).unwrap_or("unknown");

        let mut spans: Vec<(usize, usize, &'static str)> = Vec::new();

        match profile {
            Some(profile) => {
                let mut boundaries: Vec<usize> =
                    profile.boundary.find_iter(text).map(|m| m.start()).collect();
                boundaries.dedup();

                if boundaries.is_empty() {
                    // Keywords matched but no structural units found; degrade
                    // to line-aware chunking of the whole input.
                    self.line_spans(text, 0, text.len(), &mut spans, "lines");
                } else {
                    if boundaries[0] > 0 && !text[..boundaries[0]].trim().is_empty() {
                        self.line_spans(text, 0, boundaries[0], &mut spans, "preamble");
                    }
                    for (i, &b) in boundaries.iter().enumerate() {
                        let unit_end = boundaries.get(i + 1).copied().unwrap_or(text.len());
                        if text[b..unit_end].trim().is_empty() {
                            continue;
                        }
                        if unit_end - b <= self.config.max_chunk_size {
                            spans.push((b, unit_end, "definition"));
                        } else {
                            self.line_spans(text, b, unit_end, &mut spans, "definition");
                        }
                    }
                }
            }
            None => {
                self.line_spans(text, 0, text.len(), &mut spans, "lines");
            }
        }

        spans
            .into_iter()
            .enumerate()
            .map(|(position, (start, end, unit))| {
                Chunk::new(
                    &text[start..end],
                    position,
                    start,
                    end,
                    ChunkStrategy::CodeAware,
                    metadata,
                )
                .with_meta("language", serde_json::json!(language))
                .with_meta("structural_unit", serde_json::json!(unit))
            })
            .collect()
    }

    /// Detect the dominant language by keyword occurrence counts
    fn detect_language(&self, text: &str) -> Option<&LanguageProfile> {
        let mut best: Option<(&LanguageProfile, usize)> = None;
        for profile in &self.profiles {
            let score: usize = profile
                .keywords
                .iter()
                .map(|k| text.matches(k).count())
                .sum();
            if score >= 2 && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((profile, score));
            }
        }
        best.map(|(p, _)| p)
    }

    pub(crate) fn looks_like_code(&self, text: &str) -> bool {
        self.detect_language(text).is_some()
    }

    /// Accumulate lines into spans up to `chunk_size`, repeating
    /// `overlap_lines` trailing lines at the start of the next span
    fn line_spans(
        &self,
        text: &str,
        start: usize,
        end: usize,
        out: &mut Vec<(usize, usize, &'static str)>,
        unit: &'static str,
    ) {
        let region = &text[start..end];
        let lines: Vec<(usize, usize)> = {
            let mut v = Vec::new();
            let mut cursor = start;
            for line in region.split_inclusive('\n') {
                v.push((cursor, cursor + line.len()));
                cursor += line.len();
            }
            v
        };
        if lines.is_empty() {
            return;
        }

        let overlap_lines = if self.config.chunk_overlap == 0 {
            0
        } else {
            (self.config.chunk_overlap / CHARS_PER_LINE).max(1)
        };

        let mut first = 0usize;
        while first < lines.len() {
            let mut last = first;
            while last + 1 < lines.len()
                && lines[last + 1].1 - lines[first].0 <= self.config.chunk_size
            {
                last += 1;
            }
            let span = (lines[first].0, lines[last].1);
            if !text[span.0..span.1].trim().is_empty() {
                out.push((span.0, span.1, unit));
            }
            if last + 1 >= lines.len() {
                break;
            }
            first = (last + 1).saturating_sub(overlap_lines).max(first + 1);
        }
    }
}
