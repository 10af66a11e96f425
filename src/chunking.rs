//! Sentence-aligned document chunking.
//!
//! This module provides the [`Chunker`] trait and [`SentenceChunker`], which
//! splits raw extracted text into bounded, overlapping segments cut at
//! sentence boundaries where possible.

/// A strategy for splitting raw document text into chunk texts.
///
/// Implementations are pure: no I/O and no failure modes. Invalid
/// size/overlap combinations are rejected by configuration validation at
/// startup, never per call.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered, whitespace-trimmed chunk texts.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Splits text with a sliding window of `chunk_size` bytes, shifting the
/// window start back by `overlap` bytes before each non-first cut so that
/// consecutive chunks share context.
///
/// Within each window the chunker searches backward for the nearest sentence
/// boundary (`". "`, `"! "`, `"? "`, `"\n\n"`) and cuts there when the
/// boundary lies past the window midpoint, avoiding mid-sentence splits.
/// Window edges are snapped to UTF-8 character boundaries.
///
/// Every produced chunk is at most `chunk_size` long except possibly the
/// final one, which is emitted verbatim. No chunk is empty, with one
/// exception: an all-whitespace input yields a single empty string that the
/// caller (ingestion) must discard.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    overlap: usize,
}

const BOUNDARY_MARKERS: [&str; 4] = [". ", "! ", "? ", "\n\n"];

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of bytes per chunk
    /// * `overlap` — number of overlapping bytes between consecutive chunks
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }
}

/// Largest char boundary at or below `idx`.
fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest char boundary at or above `idx`.
fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Position just past the last sentence boundary in `window`, if any.
fn last_sentence_boundary(window: &str) -> Option<usize> {
    BOUNDARY_MARKERS.iter().filter_map(|marker| window.rfind(marker)).max()
}

impl Chunker for SentenceChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.len() <= self.chunk_size {
            return vec![text.trim().to_string()];
        }

        let mut chunks = Vec::new();
        let mut start: usize = 0;
        let mut prev_cut = 0;

        while start < text.len() {
            if start > 0 {
                start = floor_char_boundary(text, start.saturating_sub(self.overlap));
            }

            let end = floor_char_boundary(text, start + self.chunk_size);
            if end >= text.len() {
                let tail = text[start..].trim();
                if !tail.is_empty() {
                    chunks.push(tail.to_string());
                }
                break;
            }

            let window = &text[start..end];
            let mut cut = end;
            if let Some(boundary) = last_sentence_boundary(window) {
                // Cut just past the punctuation, but only when the boundary
                // sits in the back half of the window and still advances past
                // the previous cut (large overlaps can re-find old boundaries).
                let candidate = start + boundary + 1;
                if boundary > self.chunk_size / 2 && candidate > prev_cut {
                    cut = candidate;
                }
            }
            // Boundary flooring can pin the window end to the previous cut
            // when the overlap nearly spans the window and the text is
            // multibyte. Force at least one character of progress.
            if cut <= prev_cut {
                cut = ceil_char_boundary(text, prev_cut + 1);
            }

            let chunk = text[start..cut].trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            prev_cut = cut;
            start = cut;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = SentenceChunker::new(100, 10);
        let chunks = chunker.split("A short note.");
        assert_eq!(chunks, vec!["A short note.".to_string()]);
    }

    #[test]
    fn whitespace_input_yields_single_empty_chunk() {
        let chunker = SentenceChunker::new(100, 10);
        assert_eq!(chunker.split("   \n\t  "), vec![String::new()]);
    }

    #[test]
    fn chunks_respect_size_bound() {
        let chunker = SentenceChunker::new(80, 16);
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.len() <= 80, "chunk too long: {} bytes", chunk.len());
        }
    }

    #[test]
    fn cuts_at_sentence_boundaries() {
        let chunker = SentenceChunker::new(60, 10);
        let text = "First sentence here with some words. Second sentence follows on. \
                    Third sentence closes the paragraph out completely.";
        let chunks = chunker.split(text);
        assert!(chunks.len() > 1);
        // The first window ends at byte 60, mid-way through the second
        // sentence, but the cut lands on the nearest boundary instead.
        assert_eq!(chunks[0], "First sentence here with some words.");
        assert!(chunks[1].ends_with("follows on."));
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let overlap = 12;
        let chunker = SentenceChunker::new(64, overlap);
        // No whitespace and no sentence boundaries, so every cut lands at the
        // raw window end and trimming is a no-op.
        let text: String =
            (0..200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len() - overlap..];
            assert!(pair[1].starts_with(tail), "overlap lost between chunks");
        }
    }

    #[test]
    fn covers_the_entire_input() {
        let chunker = SentenceChunker::new(50, 8);
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. \
                    Nu xi omicron pi. Rho sigma tau upsilon.";
        let chunks = chunker.split(text);
        // The final characters of the input appear in the final chunk.
        assert!(chunks.last().unwrap().ends_with("tau upsilon."));
        // And every chunk is a verbatim (trimmed) slice of the input.
        for chunk in &chunks {
            assert!(text.contains(chunk.as_str()));
        }
    }

    #[test]
    fn multibyte_text_never_splits_a_character() {
        let chunker = SentenceChunker::new(40, 8);
        let text = "Поддержка работает с девяти утра. Ответы приходят быстро. \
                    Вопросы можно задавать в любое время суток.";
        let chunks = chunker.split(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(text.contains(chunk.as_str()));
        }
    }

    #[test]
    fn wide_chars_with_large_overlap_terminate() {
        // Four-byte chars and an overlap spanning half the window used to
        // pin the cut position in place.
        let chunker = SentenceChunker::new(10, 5);
        let text = "😀".repeat(40);
        let chunks = chunker.split(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.chars().all(|c| c == '😀'));
        }
        assert!(chunks.last().is_some_and(|c| text.ends_with(c.as_str())));
    }
}
