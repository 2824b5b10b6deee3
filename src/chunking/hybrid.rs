//! Content-type dispatch chunking
//!
//! Inspects the input for code, markdown, or structured signals and routes
//! to the matching specialized chunker, tagging the detected `content_type`
//! on every produced chunk.

use super::code::CodeChunker;
use super::markdown::MarkdownChunker;
use super::recursive::RecursiveChunker;
use super::structured::JsonChunker;
use super::types::{Chunk, ChunkConfig, Metadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Json,
    Markdown,
    Code,
    Plain,
}

impl ContentKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Code => "code",
            Self::Plain => "plain",
        }
    }
}

pub struct HybridChunker {
    json: JsonChunker,
    markdown: MarkdownChunker,
    code: CodeChunker,
    recursive: RecursiveChunker,
}

impl HybridChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            json: JsonChunker::new(config.clone()),
            markdown: MarkdownChunker::new(config.clone()),
            code: CodeChunker::new(config.clone()),
            recursive: RecursiveChunker::new(config),
        }
    }

    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let kind = self.detect(text);
        tracing::debug!("hybrid chunker detected content type '{}'", kind.as_str());

        let mut chunks = match kind {
            ContentKind::Json => self.json.chunk(text, metadata),
            ContentKind::Markdown => self.markdown.chunk(text, metadata),
            ContentKind::Code => self.code.chunk(text, metadata),
            ContentKind::Plain => self.recursive.chunk(text, metadata),
        };

        for chunk in &mut chunks {
            chunk.metadata.insert(
                "content_type".to_string(),
                serde_json::Value::String(kind.as_str().to_string()),
            );
        }
        chunks
    }

    fn detect(&self, text: &str) -> ContentKind {
        let trimmed = text.trim_start();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(text).is_ok()
        {
            return ContentKind::Json;
        }

        let markdown_signals = text.lines().filter(|l| l.trim_start().starts_with('#')).count()
            + text.matches("```").count()
            + usize::from(text.contains("**"));
        if markdown_signals >= 2 || text.lines().any(|l| l.starts_with("# ")) {
            return ContentKind::Markdown;
        }

        if self.code.looks_like_code(text) {
            return ContentKind::Code;
        }

        ContentKind::Plain
    }
}
