//! Hierarchical chunking: a root/section/paragraph tree for
//! multi-granularity retrieval

use super::sentence::paragraph_spans;
use super::types::{char_floor, Chunk, ChunkConfig, ChunkStrategy, Metadata};

#[derive(Debug, Clone)]
pub struct HierarchicalChunker {
    config: ChunkConfig,
}

impl HierarchicalChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Produce up to three levels: one root chunk (truncated to
    /// `max_chunk_size`), section chunks of roughly twice `chunk_size`, and
    /// paragraph chunks, wired together through `parent_id`/`children_ids`.
    /// Output order is root, then each section followed by its paragraphs;
    /// positions are contiguous in that order.
    pub fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let root_end = char_floor(text, self.config.max_chunk_size.min(text.len()));
        let mut root = Chunk::new(
            &text[..root_end],
            0,
            0,
            root_end,
            ChunkStrategy::Hierarchical,
            metadata,
        )
        .with_meta("level", serde_json::json!("root"));

        if self.config.hierarchy_levels <= 1 {
            return vec![root];
        }

        let paragraphs = paragraph_spans(text);
        if paragraphs.is_empty() {
            return vec![root];
        }

        // Greedy grouping of paragraphs into sections of ~2x chunk_size
        let section_target = self.config.chunk_size * 2;
        let mut sections: Vec<(usize, usize, Vec<(usize, usize)>)> = Vec::new();
        let mut members: Vec<(usize, usize)> = Vec::new();

        for &(ps, pe) in &paragraphs {
            if let Some(&(first_start, _)) = members.first() {
                if pe - first_start > section_target {
                    let end = members.last().map(|m| m.1).unwrap_or(pe);
                    sections.push((first_start, end, std::mem::take(&mut members)));
                }
            }
            members.push((ps, pe));
        }
        if let Some(&(first_start, _)) = members.first() {
            let end = members.last().map(|m| m.1).unwrap_or(text.len());
            sections.push((first_start, end, members));
        }

        let emit_paragraphs = self.config.hierarchy_levels >= 3;
        let mut out: Vec<Chunk> = Vec::new();
        let mut position = 1usize;

        for (sec_start, sec_end, sec_members) in sections {
            let mut section = Chunk::new(
                &text[sec_start..sec_end],
                position,
                sec_start,
                sec_end,
                ChunkStrategy::Hierarchical,
                metadata,
            )
            .with_meta("level", serde_json::json!("section"));
            section.parent_id = Some(root.chunk_id.clone());
            root.children_ids.push(section.chunk_id.clone());
            position += 1;

            let mut paragraph_chunks = Vec::new();
            if emit_paragraphs {
                for (ps, pe) in sec_members {
                    let mut para = Chunk::new(
                        &text[ps..pe],
                        position,
                        ps,
                        pe,
                        ChunkStrategy::Hierarchical,
                        metadata,
                    )
                    .with_meta("level", serde_json::json!("paragraph"));
                    para.parent_id = Some(section.chunk_id.clone());
                    section.children_ids.push(para.chunk_id.clone());
                    position += 1;
                    paragraph_chunks.push(para);
                }
            }

            out.push(section);
            out.extend(paragraph_chunks);
        }

        let mut result = vec![root];
        result.extend(out);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkConfig {
        ChunkConfig {
            chunk_size: 50,
            chunk_overlap: 0,
            max_chunk_size: 200,
            hierarchy_levels: 3,
            ..ChunkConfig::default()
        }
    }

    fn sample_text() -> String {
        (0..8)
            .map(|i| format!("Paragraph number {} with a little bit of text in it.", i))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_three_levels_present() {
        let text = sample_text();
        let chunks = HierarchicalChunker::new(config()).chunk(&text, &Metadata::new());

        let level = |c: &Chunk| {
            c.metadata
                .get("level")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        assert_eq!(level(&chunks[0]), "root");
        assert!(chunks.iter().any(|c| level(c) == "section"));
        assert!(chunks.iter().any(|c| level(c) == "paragraph"));
    }

    #[test]
    fn test_tree_wiring() {
        let text = sample_text();
        let chunks = HierarchicalChunker::new(config()).chunk(&text, &Metadata::new());
        let root = &chunks[0];
        assert!(root.parent_id.is_none());
        assert!(!root.children_ids.is_empty());

        for c in &chunks[1..] {
            let parent = c.parent_id.as_ref().expect("non-root has a parent");
            let parent_chunk = chunks
                .iter()
                .find(|p| &p.chunk_id == parent)
                .expect("parent exists in output");
            assert!(parent_chunk.children_ids.contains(&c.chunk_id));
        }

        // Leaves have no children
        for c in chunks.iter().filter(|c| {
            c.metadata.get("level").and_then(|v| v.as_str()) == Some("paragraph")
        }) {
            assert!(c.children_ids.is_empty());
        }
    }

    #[test]
    fn test_positions_contiguous() {
        let text = sample_text();
        let chunks = HierarchicalChunker::new(config()).chunk(&text, &Metadata::new());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.position, i);
        }
    }

    #[test]
    fn test_root_truncated_to_max() {
        let text = sample_text();
        let chunks = HierarchicalChunker::new(config()).chunk(&text, &Metadata::new());
        assert!(chunks[0].text.len() <= 200);
    }

    #[test]
    fn test_levels_config_limits_depth() {
        let text = sample_text();
        let mut cfg = config();
        cfg.hierarchy_levels = 1;
        let chunks = HierarchicalChunker::new(cfg).chunk(&text, &Metadata::new());
        assert_eq!(chunks.len(), 1);

        let mut cfg = config();
        cfg.hierarchy_levels = 2;
        let chunks = HierarchicalChunker::new(cfg).chunk(&text, &Metadata::new());
        assert!(chunks.len() > 1);
        assert!(chunks[1..].iter().all(|c| {
            c.metadata.get("level").and_then(|v| v.as_str()) == Some("section")
        }));
    }
}
