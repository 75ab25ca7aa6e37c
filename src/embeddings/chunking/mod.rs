
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::extraction::PageRecord;

/// Split points tried in order, coarsest first. The empty separator splits
/// between characters and always applies.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A span of page text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// The chunk text, trimmed
    pub content: String,
    /// Zero-based page index the chunk was cut from
    pub page: u32,
    /// Source file the page belongs to
    pub source: String,
    /// Character offset of `content` within the page text
    pub start_index: usize,
}

/// Configuration for text splitting. Sizes are measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on the length of every chunk
    pub chunk_size: usize,
    /// Trailing characters of a chunk repeated at the start of the next one
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Split every page into overlapping chunks, recording where each chunk
/// starts within its page
#[inline]
pub fn chunk_pages(pages: &[PageRecord], config: &ChunkingConfig) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for page in pages {
        let mut previous_start: usize = 0;
        let mut previous_len: usize = 0;

        for content in split_text(&page.text, config) {
            let search_from = (previous_start + previous_len).saturating_sub(config.chunk_overlap);
            let start_index = find_char_index(&page.text, &content, search_from);
            previous_start = start_index;
            previous_len = char_len(&content);

            chunks.push(DocumentChunk {
                content,
                page: page.page,
                source: page.source.clone(),
                start_index,
            });
        }
    }

    debug!(
        "Split {} pages into {} chunks (size {}, overlap {})",
        pages.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

/// Drop chunks that carry no text
#[inline]
pub fn discard_blank_chunks(chunks: Vec<DocumentChunk>) -> Vec<DocumentChunk> {
    let before = chunks.len();
    let kept: Vec<DocumentChunk> = chunks
        .into_iter()
        .filter(|chunk| !chunk.content.trim().is_empty())
        .collect();

    if kept.len() < before {
        debug!("Discarded {} blank chunks", before - kept.len());
    }
    kept
}

/// Split a single text into chunks no longer than `config.chunk_size`
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
}

fn split_recursive(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let (position, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map_or((separators.len(), ""), |(i, sep)| (i, *sep));
    let remaining = separators.get(position + 1..).unwrap_or_default();

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, remaining, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, config));
    }

    chunks
}

/// Split on `separator`, attaching each separator to the piece after it
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.split_inclusive(|_: char| true).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            if let Some(piece) = text.get(start..idx) {
                pieces.push(piece);
            }
        }
        start = idx;
    }

    if let Some(rest) = text.get(start..) {
        pieces.push(rest);
    }

    pieces.into_iter().filter(|piece| !piece.is_empty()).collect()
}

/// Greedily pack pieces into chunks, carrying up to `chunk_overlap`
/// characters of trailing pieces into the next chunk
fn merge_pieces(pieces: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size {
            if total > config.chunk_size {
                warn!(
                    "Created a chunk of size {}, which is longer than the specified {}",
                    total, config.chunk_size
                );
            }

            if !window.is_empty() {
                if let Some(chunk) = join_trimmed(&window) {
                    chunks.push(chunk);
                }

                while total > config.chunk_overlap || (total + len > config.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
        }

        window.push_back(piece);
        total += len;
    }

    if let Some(chunk) = join_trimmed(&window) {
        chunks.push(chunk);
    }

    chunks
}

fn join_trimmed(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Character index of `needle` in `haystack`, searching from character
/// `from` first and falling back to the whole text
fn find_char_index(haystack: &str, needle: &str, from: usize) -> usize {
    let from_byte = haystack
        .char_indices()
        .nth(from)
        .map_or(haystack.len(), |(byte, _)| byte);

    let found = haystack
        .get(from_byte..)
        .and_then(|tail| tail.find(needle))
        .map(|offset| from_byte + offset)
        .or_else(|| haystack.find(needle));

    found.map_or(from, |byte| {
        haystack
            .get(..byte)
            .map_or(from, |prefix| prefix.chars().count())
    })
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
