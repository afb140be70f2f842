//! Text normalizer and paragraph-boundary chunker.
//!
//! Splits extracted page text into bounded-size chunks that keep
//! paragraphs together where possible. All sizes are character counts.
//!
//! # Algorithm
//!
//! 1. Normalize the text ([`normalize_text`]); empty input yields no chunks.
//! 2. Split on `\n\n` paragraph boundaries, dropping empty paragraphs.
//! 3. Accumulate paragraphs into a buffer. Flush before a paragraph that
//!    would push the buffer past `max_chars`, and flush as soon as the
//!    buffer reaches `max_chars`.
//! 4. A paragraph strictly longer than `hard_max_chars` is sliced into
//!    `max_chars` windows, each emitted as its own chunk.
//! 5. Any chunk shorter than `min_chars` is merged into its predecessor.
//!    The first chunk has no predecessor and is kept as-is.
//!
//! The merge step does not re-check sizes, so a merged chunk may exceed
//! `max_chars`.
//!
//! # Example
//!
//! ```rust
//! use classroom_rag_core::chunk::chunk_text;
//! use classroom_rag_core::models::ChunkOptions;
//!
//! let opts = ChunkOptions { max_chars: 20, min_chars: 5, hard_max_chars: 100 };
//! let chunks = chunk_text("Para one.\n\nPara two.\n\nPara three.", &opts);
//! assert_eq!(chunks, vec!["Para one.\n\nPara two.", "Para three."]);
//! ```

use crate::models::{chunk_id, Chunk, ChunkOptions, ChunkSource, ChunkVector, UNTITLED};

/// Separator between paragraphs, both when splitting and when joining.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

const SEPARATOR_LEN: usize = 2;

/// Canonicalize whitespace in extracted text.
///
/// - `\r\n` line endings become `\n`
/// - runs of spaces and tabs become a single space
/// - three or more consecutive newlines become exactly two
/// - leading and trailing whitespace is trimmed
///
/// Never fails and is idempotent. A carriage return run directly before a
/// newline is dropped as a whole, so `\r\r\n` also normalizes to `\n`.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut newline_run = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                let mut run = 1;
                while chars.peek() == Some(&'\r') {
                    chars.next();
                    run += 1;
                }
                if chars.peek() == Some(&'\n') {
                    continue;
                }
                out.extend(std::iter::repeat('\r').take(run));
                newline_run = 0;
            }
            ' ' | '\t' => {
                while matches!(chars.peek(), Some(' ' | '\t')) {
                    chars.next();
                }
                out.push(' ');
                newline_run = 0;
            }
            '\n' => {
                newline_run += 1;
                if newline_run <= 2 {
                    out.push('\n');
                }
            }
            other => {
                out.push(other);
                newline_run = 0;
            }
        }
    }

    out.trim().to_string()
}

/// Split `text` into an ordered list of chunk strings.
///
/// Chunk order equals source order. Every returned chunk is non-empty and
/// trimmed. Empty or whitespace-only input returns an empty list.
pub fn chunk_text(text: &str, opts: &ChunkOptions) -> Vec<String> {
    let clean = normalize_text(text);
    if clean.is_empty() {
        return Vec::new();
    }

    let window = opts.max_chars.max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut buf = ChunkBuffer::default();

    for para in clean
        .split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let para_len = para.chars().count();

        if !buf.is_empty() && buf.len + SEPARATOR_LEN + para_len > opts.max_chars {
            buf.flush_into(&mut chunks);
        }

        if para_len > opts.hard_max_chars {
            buf.flush_into(&mut chunks);
            let chars: Vec<char> = para.chars().collect();
            for slice in chars.chunks(window) {
                let piece: String = slice.iter().collect();
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            }
            continue;
        }

        buf.push(para, para_len);
        if buf.len >= opts.max_chars {
            buf.flush_into(&mut chunks);
        }
    }
    buf.flush_into(&mut chunks);

    merge_short_chunks(chunks, opts.min_chars)
}

#[derive(Default)]
struct ChunkBuffer {
    text: String,
    /// Length of `text` in chars.
    len: usize,
}

impl ChunkBuffer {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn push(&mut self, para: &str, para_len: usize) {
        if !self.text.is_empty() {
            self.text.push_str(PARAGRAPH_SEPARATOR);
            self.len += SEPARATOR_LEN;
        }
        self.text.push_str(para);
        self.len += para_len;
    }

    fn flush_into(&mut self, chunks: &mut Vec<String>) {
        let trimmed = self.text.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        self.text.clear();
        self.len = 0;
    }
}

fn merge_short_chunks(chunks: Vec<String>, min_chars: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(prev) if chunk.chars().count() < min_chars => {
                prev.push_str(PARAGRAPH_SEPARATOR);
                prev.push_str(&chunk);
            }
            _ => merged.push(chunk),
        }
    }
    merged
}

/// Chunk a source document and wrap each piece in a [`Chunk`] record.
///
/// `chunk_index` is the position in the chunked sequence and `id` is
/// derived from `(course_id, source_id, chunk_index)`, so regenerating
/// from the same input yields the same ids. `extra_meta` is merged onto
/// every record after the fixed fields, so caller keys win
/// (see [`Chunk::apply_meta`]).
pub fn make_chunk_objects(source: &ChunkSource) -> Vec<Chunk> {
    let title = source
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED);

    chunk_text(&source.text, &source.chunk_opts)
        .into_iter()
        .enumerate()
        .map(|(idx, text)| {
            let mut chunk = Chunk {
                id: chunk_id(&source.course_id, &source.source_id, idx),
                course_id: source.course_id.clone(),
                source_id: source.source_id.clone(),
                title: title.to_string(),
                chunk_index: idx,
                text,
                vector: ChunkVector::Lexical,
                extra: Default::default(),
            };
            chunk.apply_meta(&source.extra_meta);
            chunk
        })
        .collect()
}
