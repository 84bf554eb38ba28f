//! Boundary-aware overlapping text chunker.
//!
//! Splits document body text into spans that respect a configurable
//! `chunk_size` budget. Splitting prefers paragraph boundaries (`\n\n`),
//! then sentence ends, then single newlines and spaces, and falls back
//! to a hard cut snapped to a UTF-8 character boundary when a single
//! run of text exceeds the budget.
//!
//! Each chunk after the first starts `overlap` bytes before the end of
//! the previous chunk, so neighbouring chunks share context. Spans are
//! byte ranges into the original text: they cover the document
//! contiguously (with overlap), so concatenating span texts with the
//! overlapping prefixes removed reconstructs the document exactly.
//!
//! # Algorithm
//!
//! 1. If the remaining text fits in `chunk_size`, emit it as the final
//!    chunk.
//! 2. Otherwise look at the window of the next `chunk_size` bytes and
//!    cut at the last paragraph break, else the last sentence end, else
//!    the last newline or space, else hard-cut at the window edge.
//! 3. The next chunk starts `overlap` bytes before the cut (clamped so
//!    the sequence always makes forward progress).
//!
//! The returned [`ChunkSplitter`] is a lazy, finite iterator; splitting
//! the same text with the same configuration is deterministic, so the
//! sequence can be regenerated at will.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// A chunk's byte range within the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

/// Lazy iterator over the chunk spans of one document.
#[derive(Debug, Clone)]
pub struct ChunkSplitter<'a> {
    text: &'a str,
    chunk_size: usize,
    overlap: usize,
    pos: usize,
    last_end: usize,
}

/// Split `text` into overlapping spans within the `chunk_size` budget.
///
/// An empty document yields an empty sequence, not an error. A document
/// shorter than `chunk_size` yields a single span.
///
/// # Errors
///
/// `Error::Config` if `chunk_size` is zero or `overlap >= chunk_size`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<ChunkSplitter<'_>> {
    if chunk_size == 0 {
        return Err(Error::Config("chunk_size must be > 0".into()));
    }
    if overlap >= chunk_size {
        return Err(Error::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(ChunkSplitter {
        text,
        chunk_size,
        overlap,
        pos: 0,
        last_end: 0,
    })
}

/// Chunk a document into [`Chunk`] records with contiguous indices.
pub fn chunk_document(doc: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let spans = split(&doc.body, config.chunk_size, config.overlap)?;
    Ok(spans
        .enumerate()
        .map(|(i, span)| Chunk {
            document_id: doc.id.clone(),
            chunk_index: i as i64,
            text: span.text.to_string(),
            document_hash: doc.content_hash.clone(),
        })
        .collect())
}

impl<'a> Iterator for ChunkSplitter<'a> {
    type Item = ChunkSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let mut start = self.pos;

        // Everything left fits: emit the tail and finish.
        if self.text.len() - start <= self.chunk_size {
            let end = self.text.len();
            self.pos = end;
            return Some(ChunkSpan {
                start,
                end,
                text: &self.text[start..],
            });
        }

        let mut limit = floor_char_boundary(self.text, start + self.chunk_size);
        if limit <= start {
            // chunk_size smaller than one multi-byte char; take one char.
            limit = ceil_char_boundary(self.text, start + 1);
        }

        let window = &self.text[start..limit];
        let mut end = match boundary_in(window) {
            Some(i) => start + i,
            None => limit,
        };
        // Each chunk must end past the previous one or the overlap
        // rewind would stall the sequence.
        if end <= self.last_end {
            end = limit;
            if end <= self.last_end {
                // Multi-byte flooring pulled the whole window inside
                // the previous chunk. Take the next char past it and
                // move the start up so the span stays within budget.
                end = ceil_char_boundary(self.text, self.last_end + 1);
                let min_start =
                    floor_char_boundary(self.text, end.saturating_sub(self.chunk_size));
                if min_start > start {
                    start = min_start;
                }
            }
        }
        self.last_end = end;

        let mut next = floor_char_boundary(self.text, end.saturating_sub(self.overlap));
        if next <= start || end >= self.text.len() {
            // Chunk shorter than the overlap, or already at the end;
            // skip the overlap to keep forward progress.
            next = end;
        }
        self.pos = next;

        Some(ChunkSpan {
            start,
            end,
            text: &self.text[start..end],
        })
    }
}

/// Find the best cut point inside `window`, as a byte offset past the
/// boundary. Returns `None` when no boundary exists (forces a hard cut).
fn boundary_in(window: &str) -> Option<usize> {
    if let Some(i) = window.rfind("\n\n") {
        if i > 0 {
            return Some(i + 2);
        }
    }
    // Last sentence end: terminator punctuation followed by whitespace.
    let bytes = window.as_bytes();
    for i in (1..bytes.len()).rev() {
        if bytes[i].is_ascii_whitespace() && matches!(bytes[i - 1], b'.' | b'!' | b'?') {
            return Some(i);
        }
    }
    if let Some(i) = window.rfind('\n') {
        if i > 0 {
            return Some(i + 1);
        }
    }
    if let Some(i) = window.rfind(' ') {
        if i > 0 {
            return Some(i + 1);
        }
    }
    None
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkSpan<'_>> {
        split(text, chunk_size, overlap).unwrap().collect()
    }

    /// Rebuild the source text from spans by dropping each span's
    /// overlapping prefix.
    fn reconstruct(doc: &str, spans: &[ChunkSpan<'_>]) -> String {
        let mut out = String::new();
        let mut prev_end = 0;
        for (i, s) in spans.iter().enumerate() {
            if i == 0 {
                out.push_str(s.text);
            } else {
                out.push_str(&doc[prev_end..s.end]);
            }
            prev_end = s.end;
        }
        out
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        assert!(spans("", 100, 10).is_empty());
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = spans("Hello, world!", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        assert!(matches!(split("abc", 10, 10), Err(Error::Config(_))));
        assert!(matches!(split("abc", 10, 11), Err(Error::Config(_))));
        assert!(split("abc", 10, 9).is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(split("abc", 0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_splits_on_paragraph_boundary() {
        let text = "First paragraph with some words.\n\nSecond paragraph with more words here.";
        let chunks = spans(text, 40, 0);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert!(chunks[0].text.starts_with("First paragraph"));
    }

    #[test]
    fn test_splits_on_sentence_boundary() {
        let text = "One sentence here. Another sentence follows. Third one ends.";
        let chunks = spans(text, 30, 5);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].text.trim_end().ends_with('.'));
    }

    #[test]
    fn test_oversized_run_hard_cut() {
        let text = "a".repeat(95);
        let chunks = spans(&text, 20, 5);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 20);
        }
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let text = "b".repeat(60);
        let chunks = spans(&text, 20, 5);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 5);
        }
    }

    #[test]
    fn test_reconstruction_round_trip() {
        let text = "Alpha begins the story. It goes on for a while longer.\n\n\
                    Beta continues it with details and asides that run long.\n\n\
                    Gamma wraps everything up neatly at the very end of it all.";
        for (size, overlap) in [(40, 10), (50, 0), (25, 8), (200, 50)] {
            let chunks = spans(text, size, overlap);
            assert_eq!(
                reconstruct(text, &chunks),
                text,
                "round trip failed for size={} overlap={}",
                size,
                overlap
            );
        }
    }

    #[test]
    fn test_spans_cover_document() {
        let text = "Coverage check. Spans must leave no gaps. Ever. At all. Period.";
        let chunks = spans(text, 20, 6);
        assert_eq!(chunks.first().unwrap().start, 0);
        assert_eq!(chunks.last().unwrap().end, text.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].start <= pair[0].end, "gap between spans");
        }
    }

    #[test]
    fn test_deterministic_and_restartable() {
        let text = "Alpha.\n\nBeta.\n\nGamma.\n\nDelta text that is somewhat longer than the rest.";
        let a: Vec<_> = spans(text, 25, 5);
        let b: Vec<_> = spans(text, 25, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐ naïve café ─ résumé ┘".repeat(4);
        for (size, overlap) in [(10, 3), (7, 0), (32, 9)] {
            let chunks = spans(&text, size, overlap);
            assert!(!chunks.is_empty());
            assert_eq!(reconstruct(&text, &chunks), text);
        }
    }

    #[test]
    fn test_deep_overlap_multibyte_stays_within_budget() {
        // With overlap close to chunk_size, flooring around the
        // multi-byte char can pull the search window entirely inside
        // the previous chunk; progress must continue without emitting
        // an oversized span.
        let text = "abcd €xyz and then € some more text to split up";
        let chunks = spans(text, 5, 3);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert!(pair[1].end > pair[0].end, "ends must strictly increase");
            assert!(pair[1].start <= pair[0].end, "gap between spans");
        }
        for c in &chunks {
            assert!(c.end - c.start <= 5, "span over budget: {:?}", c);
        }
        assert_eq!(reconstruct(text, &chunks), text);
    }

    #[test]
    fn test_chunk_document_indices_contiguous() {
        let doc = Document {
            id: "notes/a.md".to_string(),
            path: "docs/notes/a.md".into(),
            body: (0..30)
                .map(|i| format!("Paragraph number {}.", i))
                .collect::<Vec<_>>()
                .join("\n\n"),
            modified_at: 0,
            content_hash: "h".to_string(),
        };
        let cfg = ChunkingConfig {
            chunk_size: 60,
            overlap: 10,
        };
        let chunks = chunk_document(&doc, &cfg).unwrap();
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.document_id, "notes/a.md");
            assert_eq!(c.document_hash, "h");
        }
    }
}
