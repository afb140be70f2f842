//! Lexical retrieval over in-memory chunks.
//!
//! Scoring is raw substring counting: every query token (see [`tokenize`])
//! is counted in the lower-cased chunk text, plus a fixed bonus when the
//! whole query appears verbatim. Chunk sets are small (a few dozen
//! records), so a linear scan is all that is needed.
//!
//! [`top_k`] dispatches between keyword retrieval and the vector path in
//! [`crate::embedding`] depending on the kind of [`Query`].

use std::cmp::Ordering;

use crate::embedding::top_k_by_embedding;
use crate::models::Chunk;

/// Default number of chunks returned by top-K retrieval.
pub const DEFAULT_TOP_K: usize = 5;

/// Bonus added when the trimmed, lower-cased query appears as a phrase.
pub const PHRASE_BONUS: usize = 4;

/// Tokens shorter than this are dropped.
const MIN_TOKEN_LEN: usize = 3;

/// A chunk paired with its relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk<'a, S> {
    pub chunk: &'a Chunk,
    pub score: S,
}

/// A retrieval query: plain text for keyword scoring, or a vector for
/// similarity scoring against embedded chunks.
#[derive(Debug, Clone, Copy)]
pub enum Query<'q> {
    Keyword(&'q str),
    Vector(&'q [f32]),
}

/// Split a query into lower-case alphanumeric tokens.
///
/// Anything outside `[a-z0-9]` after lower-casing becomes a separator, and
/// tokens shorter than three characters are dropped.
///
/// ```rust
/// use classroom_rag_core::retrieve::tokenize;
///
/// assert_eq!(tokenize("What is the Due Date?!"), vec!["what", "the", "due", "date"]);
/// ```
pub fn tokenize(query: &str) -> Vec<String> {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Score `text` against `query`.
///
/// Sums the non-overlapping occurrence counts of every query token in the
/// lower-cased text, then adds [`PHRASE_BONUS`] if the whole trimmed query
/// occurs in it. A query with no usable tokens scores 0.
pub fn keyword_score(query: &str, text: &str) -> usize {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return 0;
    }

    let hay = text.to_lowercase();
    let mut score: usize = tokens.iter().map(|t| hay.matches(t.as_str()).count()).sum();

    let phrase = query.to_lowercase();
    let phrase = phrase.trim();
    if !phrase.is_empty() && hay.contains(phrase) {
        score += PHRASE_BONUS;
    }

    score
}

/// Score every chunk, keeping those with a positive score, sorted by
/// descending score. Equal scores keep their input order.
pub fn score_by_keyword<'a>(chunks: &'a [Chunk], query: &str) -> Vec<ScoredChunk<'a, usize>> {
    let mut scored: Vec<ScoredChunk<'a, usize>> = chunks
        .iter()
        .map(|chunk| ScoredChunk {
            chunk,
            score: keyword_score(query, &chunk.text),
        })
        .filter(|s| s.score > 0)
        .collect();
    // stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// Return at most `k` chunks with a positive keyword score, best first.
pub fn top_k_by_keyword<'a>(chunks: &'a [Chunk], query: &str, k: usize) -> Vec<&'a Chunk> {
    score_by_keyword(chunks, query)
        .into_iter()
        .take(k)
        .map(|s| s.chunk)
        .collect()
}

/// Top-K retrieval dispatched on the query kind.
///
/// Keyword queries consider every chunk; vector queries only consider
/// chunks that carry an embedding.
pub fn top_k<'a>(chunks: &'a [Chunk], query: Query<'_>, k: usize) -> Vec<&'a Chunk> {
    match query {
        Query::Keyword(q) => top_k_by_keyword(chunks, q, k),
        Query::Vector(v) => top_k_by_embedding(chunks, v, k),
    }
}

/// Descending comparison for float scores; incomparable values tie.
pub(crate) fn desc_f32(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
