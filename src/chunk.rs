//! Sentence-preferring sliding-window text chunker.
//!
//! Splits cleaned document text into overlapping windows of at most
//! `max_chars` characters. Before cutting a window, the chunker looks back a
//! short distance for a sentence terminator (`.`, `!`, `?`) and cuts right
//! after it when one is found, so most chunks end on a full sentence.
//!
//! All positions are character offsets, never byte offsets, so multi-byte
//! text is never split inside a code point.

use anyhow::{bail, Result};

use crate::models::Chunk;

/// Maximum number of characters scanned backward for a sentence end.
const SENTENCE_LOOKBACK: usize = 100;

/// Collapses every whitespace run to a single space and trims the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into overlapping chunks, preferring sentence boundaries.
///
/// Text no longer than `max_chars` is returned unchanged as a single chunk.
/// Consecutive windows overlap by `overlap` characters; whitespace-only
/// pieces are dropped.
///
/// # Errors
///
/// Fails when `max_chars` is zero or `overlap >= max_chars`.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>> {
    if max_chars == 0 {
        bail!("chunk size must be > 0");
    }
    if overlap >= max_chars {
        bail!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap,
            max_chars
        );
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return Ok(vec![text.to_string()]);
    }

    let chunks = chunk_spans(&chars, max_chars, overlap)
        .into_iter()
        .filter_map(|(start, end)| {
            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect();

    Ok(chunks)
}

/// Chunk a document's text and assign contiguous indices and identifiers.
pub fn chunk_document(
    document_id: &str,
    text: &str,
    max_chars: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    let chunks = chunk_text(text, max_chars, overlap)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: Chunk::make_id(document_id, index),
            document_id: document_id.to_string(),
            chunk_index: index,
            text,
        })
        .collect();
    Ok(chunks)
}

/// Computes `[start, end)` character windows over `chars`.
///
/// Requires `overlap < max_chars`. Every window starts strictly after the
/// previous one; if a sentence cut pulled `end` back far enough that
/// `end - overlap` would not advance, the next window starts at `end`.
fn chunk_spans(chars: &[char], max_chars: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let lookback = SENTENCE_LOOKBACK.min(max_chars / 4);
    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + max_chars).min(len);

        if end < len {
            if let Some(pos) = (1..=lookback)
                .map(|i| end - i)
                .find(|&pos| is_sentence_end(chars[pos]))
            {
                end = pos + 1;
            }
        }

        spans.push((start, end));

        if end >= len {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    spans
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}
