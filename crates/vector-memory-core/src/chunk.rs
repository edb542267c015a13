//! Overlapping, boundary-aware text chunker.
//!
//! Splits document text into segments of at most `chunk_size` characters,
//! where each segment after the first starts with the last `chunk_overlap`
//! characters of the one before it. Sizes are counted in Unicode scalar
//! values, so multi-byte text is never cut inside a character.
//!
//! # Algorithm
//!
//! 1. Text that is empty or whitespace-only yields no chunks.
//! 2. Text of at most `chunk_size` characters yields one chunk, verbatim.
//! 3. Otherwise a window of `chunk_size` characters is laid over the text.
//!    Its end is pulled back to the last paragraph break (`\n\n`), line
//!    break, or space inside the window, trying each separator in that
//!    order, provided the chunk keeps at least half of `chunk_size` and
//!    extends past the overlap region. With no usable separator the window
//!    is hard-cut at `chunk_size`.
//! 4. The next window starts `chunk_overlap` characters before the previous
//!    chunk's end.
//!
//! Because the overlap is exact, dropping the first `chunk_overlap`
//! characters from every chunk but the first and concatenating gives back
//! the original text.
//!
//! # Example
//!
//! ```rust
//! use vector_memory_core::chunk::split_text;
//!
//! let chunks = split_text("Hello world.\n\nSecond paragraph.", 1000, 100).unwrap();
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{MemoryError, Result};
use crate::models::{
    Chunk, Document, Metadata, CHUNK_INDEX_KEY, CONTENT_HASH_KEY, CONTENT_TYPE_KEY,
    SOURCE_PATH_KEY,
};

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default characters shared between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Preferred chunk boundaries, strongest first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Reject configurations where chunks could not make progress.
pub fn validate_params(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 || chunk_overlap >= chunk_size {
        return Err(MemoryError::InvalidChunking {
            chunk_size,
            chunk_overlap,
        });
    }
    Ok(())
}

/// Split `text` into overlapping chunks.
///
/// # Errors
///
/// Returns [`MemoryError::InvalidChunking`] when `chunk_size` is zero or
/// `chunk_overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    validate_params(chunk_size, chunk_overlap)?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char, plus the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = offsets.len() - 1;

    if total_chars <= chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let min_len = chunk_overlap.max(chunk_size / 2);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(total_chars);
        let end = if hard_end == total_chars {
            total_chars
        } else {
            find_boundary(text, &offsets, start + min_len, hard_end).unwrap_or(hard_end)
        };

        chunks.push(text[offsets[start]..offsets[end]].to_string());

        if end == total_chars {
            break;
        }
        start = end - chunk_overlap;
    }

    Ok(chunks)
}

/// Find the char index just past the last separator inside `[lo, hi)`.
///
/// The returned index is always strictly greater than `lo`.
fn find_boundary(text: &str, offsets: &[usize], lo: usize, hi: usize) -> Option<usize> {
    if lo >= hi {
        return None;
    }
    let window_start = offsets[lo];
    let window = &text[window_start..offsets[hi]];

    SEPARATORS.iter().find_map(|sep| {
        window.rfind(sep).map(|pos| {
            let byte_end = window_start + pos + sep.len();
            offsets.binary_search(&byte_end).unwrap_or_else(|i| i)
        })
    })
}

/// Chunk a loaded document and tag every chunk with its metadata.
///
/// Each chunk carries the document's canonical `source_path`, its
/// `chunk_index`, the document `content_type`, and a SHA-256
/// `content_hash` of the chunk text.
pub fn chunk_document(doc: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    let pieces = split_text(&doc.text, chunk_size, chunk_overlap)?;
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| make_chunk(doc, index, content))
        .collect())
}

fn make_chunk(doc: &Document, index: usize, content: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let mut metadata = Metadata::new();
    metadata.insert(SOURCE_PATH_KEY.to_string(), json!(doc.source_path));
    metadata.insert(CHUNK_INDEX_KEY.to_string(), json!(index));
    metadata.insert(CONTENT_TYPE_KEY.to_string(), json!(doc.content_type));
    metadata.insert(CONTENT_HASH_KEY.to_string(), json!(hash));

    Chunk { content, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(c);
            } else {
                out.extend(c.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 1000, 100).unwrap().is_empty());
        assert!(split_text("  \n\n ", 1000, 100).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let text = "A fifty character sentence about tidal energy ok.";
        let chunks = split_text(text, 1000, 100).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_exactly_chunk_size_is_one_chunk() {
        let text = "x".repeat(64);
        let chunks = split_text(&text, 64, 8).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_rejects_overlap_not_less_than_size() {
        assert!(matches!(
            split_text("abc", 10, 10),
            Err(MemoryError::InvalidChunking { .. })
        ));
        assert!(matches!(
            split_text("abc", 10, 11),
            Err(MemoryError::InvalidChunking { .. })
        ));
        assert!(matches!(
            split_text("abc", 0, 0),
            Err(MemoryError::InvalidChunking { .. })
        ));
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_text(&text, 120, 20).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 120);
        }
        for pair in chunks.windows(2) {
            let tail: String = {
                let chars: Vec<char> = pair[0].chars().collect();
                chars[chars.len() - 20..].iter().collect()
            };
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn test_reconstructs_original_text() {
        let text = "First paragraph with some words.\n\nSecond paragraph, a bit longer than the first one.\nWith a second line.\n\nThird.";
        for (size, overlap) in [(30, 5), (40, 0), (25, 12), (200, 50)] {
            let chunks = split_text(text, size, overlap).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), text, "size={} overlap={}", size, overlap);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = "Alpha alpha alpha alpha.\n\nBeta beta beta beta beta.";
        let chunks = split_text(text, 40, 0).unwrap();
        assert_eq!(chunks[0], "Alpha alpha alpha alpha.\n\n");
        assert_eq!(chunks[1], "Beta beta beta beta beta.");
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "a".repeat(25);
        let chunks = split_text(&text, 10, 2).unwrap();
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = split_text(text, 7, 3).unwrap();
        for c in &chunks {
            assert!(c.chars().count() <= 7);
        }
        assert_eq!(reconstruct(&chunks, 3), text);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta ".repeat(20);
        let c1 = split_text(&text, 50, 10).unwrap();
        let c2 = split_text(&text, 50, 10).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_chunk_document_tags_metadata() {
        let doc = Document {
            source_path: "/abs/path/a.txt".to_string(),
            content_type: "text/plain".to_string(),
            text: "one two three four five six seven".to_string(),
        };
        let chunks = chunk_document(&doc, 12, 2).unwrap();
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.source_path(), Some("/abs/path/a.txt"));
            assert_eq!(c.metadata[CHUNK_INDEX_KEY], json!(i));
            assert_eq!(c.metadata[CONTENT_TYPE_KEY], json!("text/plain"));
            assert_eq!(c.metadata[CONTENT_HASH_KEY].as_str().unwrap().len(), 64);
        }
    }
}
