//! Recursive character splitter.
//!
//! Text is split on the coarsest separator that occurs in it (`"\n\n"`, then
//! `"\n"`, then `" "`, then individual characters). Pieces that still exceed
//! the chunk size are split again with the finer separators, and small pieces
//! are greedily merged back into windows of at most `chunk_size` characters
//! where consecutive windows share up to `chunk_overlap` characters.
//! Separators stay attached to the start of the piece that follows them.
//! Sizes are counted in chars, not bytes.

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};
use std::collections::VecDeque;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config, separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect() })
    }

    /// Splits every document, numbering chunks per document. Documents whose
    /// text is blank produce no chunks.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(|(chunk_index, content)| Chunk {
                        content,
                        source_id: doc.source_id.clone(),
                        chunk_index,
                    })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge_splits(&small));
                small.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge_splits(&small));
        }
        chunks
    }

    /// Greedy window merge. Once a window is full it is emitted, then pieces
    /// are dropped from its front until at most `chunk_overlap` chars remain
    /// and the next piece fits.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            if total + len > size && !window.is_empty() {
                push_trimmed(&mut out, &window);
                while total > overlap || (total + len > size && total > 0) {
                    let Some((_, front)) = window.pop_front() else { break };
                    total = total.saturating_sub(front);
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        push_trimmed(&mut out, &window);
        out
    }
}

fn push_trimmed(out: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Splits `text` on `separator`, attaching each separator to the start of the
/// piece after it. An empty separator splits into chars. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(ChunkingConfig { chunk_size: size, chunk_overlap: overlap }).unwrap()
    }

    #[test]
    fn unbroken_text_uses_character_windows_with_overlap() {
        let text: String = (0..2500).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
        let chunks = splitter(1000, 100).split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], &text[0..1000]);
        assert_eq!(chunks[1], &text[900..1900]);
        assert_eq!(chunks[2], &text[1800..2500]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = splitter(1000, 100).split_text("  Office hours are 9 to 5.\n");
        assert_eq!(chunks, vec!["Office hours are 9 to 5.".to_string()]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(splitter(1000, 100).split_text(" \n\n \n").is_empty());
        assert!(splitter(1000, 100).split_text("").is_empty());
    }

    #[test]
    fn paragraphs_are_preferred_boundaries() {
        let para = "word ".repeat(30); // 150 chars
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = splitter(320, 20).split_text(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 320));
        assert!(!chunks[0].contains("\n\n\n"));
    }

    #[test]
    fn chunks_never_exceed_size_for_multibyte_text() {
        let text = "Überstunden müssen genehmigt werden. ".repeat(80);
        let s = splitter(200, 30);
        let chunks = s.split_text(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 200, "chunk too long: {}", c.chars().count());
        }
    }

    #[test]
    fn split_documents_numbers_chunks_per_document() {
        let s = splitter(1000, 100);
        let long: String = "x".repeat(1500);
        let docs = vec![Document::new(long, "sales/A.txt"), Document::new("tiny", "general/B.txt")];
        let chunks = s.split_documents(&docs);
        let indices: Vec<(&str, usize)> =
            chunks.iter().map(|c| (c.source_id.as_str(), c.chunk_index)).collect();
        assert_eq!(indices, vec![("sales/A.txt", 0), ("sales/A.txt", 1), ("general/B.txt", 0)]);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(TextSplitter::new(ChunkingConfig { chunk_size: 100, chunk_overlap: 100 }).is_err());
        assert!(TextSplitter::new(ChunkingConfig { chunk_size: 0, chunk_overlap: 0 }).is_err());
    }
}
