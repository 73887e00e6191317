//! Splits page text into overlapping, position-tagged chunks.
//!
//! Each chunk is cut at the highest-priority separator found inside the window
//! `(start + overlap, start + chunk_size]`; if no separator occurs there the cut
//! falls back to a plain character boundary at `start + chunk_size`. The next chunk
//! starts exactly `chunk_overlap` characters before the previous cut, so adjacent
//! chunks of a page always share exactly `chunk_overlap` characters. Chunks never
//! cross a page break.

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    overlap: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Rejects `overlap >= chunk_size` and other invalid settings up front.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk every page of `document` in reading order. Blank pages yield nothing.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            let bounds = char_bounds(&page.text);
            for span in self.split_page(&page.text, &bounds) {
                let chunk_index = chunks.len();
                chunks.push(Chunk {
                    chunk_id: format!("{}:{}", document.id, chunk_index),
                    document_id: document.id.clone(),
                    chunk_index,
                    page_number: page.page_number,
                    start_offset: span.start,
                    end_offset: span.end,
                    overlap_with_previous: span.overlap,
                    text: page.text[bounds[span.start]..bounds[span.end]].to_string(),
                });
            }
        }
        chunks
    }

    fn split_page(&self, text: &str, bounds: &[usize]) -> Vec<Span> {
        let Some((lo, hi)) = content_range(text, bounds) else { return Vec::new() };
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut spans: Vec<Span> = Vec::new();
        let mut start = lo;
        loop {
            let limit = (start + size).min(hi);
            let end = if limit == hi { hi } else { self.find_cut(text, bounds, start + overlap, limit) };
            let shared = if spans.is_empty() { 0 } else { overlap };
            spans.push(Span { start, end, overlap: shared });
            if end == hi {
                break;
            }
            start = end - overlap;
        }
        spans
    }

    /// Best cut in `(floor, limit]` (character indices).
    fn find_cut(&self, text: &str, bounds: &[usize], floor: usize, limit: usize) -> usize {
        let window_start = bounds[floor];
        let window = &text[window_start..bounds[limit]];
        for sep in &self.config.separators {
            if let Some(pos) = window.rfind(sep.as_str()) {
                let cut_byte = window_start + pos + sep.len();
                if let Ok(cut) = bounds.binary_search(&cut_byte) {
                    if cut > floor {
                        return cut;
                    }
                }
            }
        }
        limit
    }
}

/// Byte offset of every character start, plus `text.len()` as a sentinel.
fn char_bounds(text: &str) -> Vec<usize> {
    text.char_indices().map(|(b, _)| b).chain(std::iter::once(text.len())).collect()
}

/// Character range `[lo, hi)` without leading/trailing whitespace.
fn content_range(text: &str, bounds: &[usize]) -> Option<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let lo = chars.iter().position(|c| !c.is_whitespace())?;
    let hi = chars.iter().rposition(|c| !c.is_whitespace())? + 1;
    debug_assert!(hi < bounds.len());
    Some((lo, hi))
}
