use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document};
use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// # Errors
    ///
    /// Returns `IndexError::InvalidChunking` if `chunk_size` is zero or not larger than `chunk_overlap`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(IndexError::InvalidChunking {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            });
        }
        Ok(())
    }
}

/// Splits documents into overlapping character windows.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// # Errors
    ///
    /// Returns `IndexError::InvalidChunking` for an unusable configuration.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.content.chars().collect();
        spans(&chars, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                content: chars[start..end].iter().collect(),
                metadata: document.metadata.clone(),
                chunk_index: i,
                offset: start,
            })
            .collect()
    }

    #[must_use]
    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.split(d)).collect()
    }
}

/// Split raw text into chunk strings.
///
/// # Errors
///
/// Returns `IndexError::InvalidChunking` when `chunk_overlap >= chunk_size` or `chunk_size == 0`.
pub fn split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    ChunkerConfig {
        chunk_size,
        chunk_overlap,
    }
    .validate()?;
    let chars: Vec<char> = text.chars().collect();
    Ok(spans(&chars, chunk_size, chunk_overlap)
        .into_iter()
        .map(|(start, end)| chars[start..end].iter().collect())
        .collect())
}

/// Window boundaries as `[start, end)` char ranges. Each window after the first
/// starts `overlap` chars before the previous one ended.
fn spans(chars: &[char], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut out = Vec::new();
    if len == 0 {
        return out;
    }

    let mut start = 0;
    loop {
        let hard_end = (start + size).min(len);
        if hard_end == len {
            out.push((start, len));
            break;
        }
        // Ending past start + overlap guarantees the next window moves forward.
        // Boundaries in the first half of the window are ignored to avoid tiny chunks.
        let lo = (start + overlap + 1).max(start + size / 2);
        let end = find_boundary(chars, lo, hard_end).unwrap_or(hard_end);
        out.push((start, end));
        start = end - overlap;
    }
    out
}

/// Best end position in `lo..=hi`, searching backwards from `hi`:
/// after a blank line, then after a newline, then after any whitespace.
fn find_boundary(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo > hi {
        return None;
    }
    let paragraph = (lo..=hi)
        .rev()
        .find(|&e| e >= 2 && chars[e - 1] == '\n' && chars[e - 2] == '\n');
    paragraph
        .or_else(|| (lo..=hi).rev().find(|&e| chars[e - 1] == '\n'))
        .or_else(|| (lo..=hi).rev().find(|&e| chars[e - 1].is_whitespace()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::document::DocumentMetadata;

    fn doc(content: &str) -> Document {
        Document {
            content: content.into(),
            metadata: DocumentMetadata::new("bncc.txt", "text/plain"),
        }
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(split("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split("abc", 10, 2).unwrap(), vec!["abc"]);
    }

    #[test]
    fn overlap_equal_to_size_rejected() {
        let err = split("abc", 10, 10).unwrap_err();
        assert!(matches!(
            err,
            IndexError::InvalidChunking {
                chunk_size: 10,
                chunk_overlap: 10
            }
        ));
    }

    #[test]
    fn zero_size_rejected() {
        assert!(Chunker::new(ChunkerConfig {
            chunk_size: 0,
            chunk_overlap: 0
        })
        .is_err());
    }

    #[test]
    fn hard_cut_without_whitespace() {
        let chunks = split("abcdefghij", 4, 1).unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn prefers_paragraph_break() {
        let text = "aaaa bbbb\n\ncccc dddd eeee";
        let chunks = split(text, 14, 2).unwrap();
        assert_eq!(chunks[0], "aaaa bbbb\n\n");
    }

    #[test]
    fn prefers_line_over_space() {
        let text = "aaa bbb\nccc ddd eee fff";
        let chunks = split(text, 12, 0).unwrap();
        assert_eq!(chunks[0], "aaa bbb\n");
    }

    #[test]
    fn counts_chars_not_bytes() {
        let chunks = split("çãéõâ", 2, 0).unwrap();
        assert_eq!(chunks, vec!["çã", "éõ", "â"]);
    }

    #[test]
    fn document_split_tracks_offsets_and_metadata() {
        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: 4,
            chunk_overlap: 1,
        })
        .unwrap();
        let chunks = chunker.split(&doc("abcdefghij"));
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.offset).collect::<Vec<_>>(),
            vec![0, 3, 6]
        );
        assert_eq!(chunks[2].chunk_index, 2);
        assert_eq!(chunks[1].metadata.source, "bncc.txt");
    }

    #[test]
    fn default_config_matches_corpus_settings() {
        let cfg = ChunkerConfig::default();
        assert_eq!((cfg.chunk_size, cfg.chunk_overlap), (1000, 200));
    }

    proptest! {
        #[test]
        fn consecutive_chunks_share_exactly_overlap(
            text in "[a-z \n]{0,400}",
            size in 2usize..60,
            overlap_frac in 0.0f64..1.0,
        ) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let overlap = ((size - 1) as f64 * overlap_frac) as usize;
            let chunks = split(&text, size, overlap).unwrap();
            for c in &chunks {
                prop_assert!(c.chars().count() <= size);
            }
            for pair in chunks.windows(2) {
                let prev: Vec<char> = pair[0].chars().collect();
                let next: Vec<char> = pair[1].chars().collect();
                let tail: String = prev[prev.len() - overlap..].iter().collect();
                let head: String = next[..overlap].iter().collect();
                prop_assert_eq!(tail, head);
            }
        }

        #[test]
        fn chunks_cover_text_in_order(
            text in "[a-z \n]{1,300}",
            size in 2usize..40,
        ) {
            let overlap = size / 3;
            let chunks = split(&text, size, overlap).unwrap();
            let mut rebuilt: String = chunks[0].clone();
            for c in &chunks[1..] {
                rebuilt.extend(c.chars().skip(overlap));
            }
            prop_assert_eq!(rebuilt, text);
        }

        #[test]
        fn split_is_deterministic(text in "\\PC{0,300}", size in 1usize..50) {
            let overlap = size / 2;
            prop_assert_eq!(split(&text, size, overlap).unwrap(), split(&text, size, overlap).unwrap());
        }
    }
}
