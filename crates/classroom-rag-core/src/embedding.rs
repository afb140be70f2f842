//! Vector similarity retrieval.
//!
//! This is an optional path: the server pipeline never embeds. Chunks
//! become eligible once a vector is attached, either directly with
//! [`Chunk::with_embedding`] or through an [`EmbeddingProvider`] via
//! [`embed_chunks`]. Lexical-only chunks are skipped.

use crate::models::Chunk;
use crate::retrieve::{desc_f32, ScoredChunk};

/// Produces embedding vectors for text.
///
/// No backend ships with this crate; an application plugs one in and uses
/// [`embed_chunks`] and [`top_k_by_text`] to drive retrieval with it.
pub trait EmbeddingProvider {
    /// Length of every vector returned by [`embed`](Self::embed).
    fn dims(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Attach an embedding of each chunk's text.
///
/// A vector whose length is not [`EmbeddingProvider::dims`] is discarded
/// and the chunk stays lexical-only.
pub fn embed_chunks(provider: &dyn EmbeddingProvider, chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|chunk| {
            let vector = provider.embed(&chunk.text);
            if vector.len() == provider.dims() {
                chunk.with_embedding(vector)
            } else {
                chunk
            }
        })
        .collect()
}

/// Embed `query` with `provider` and return the `k` most similar chunks.
pub fn top_k_by_text<'a>(
    provider: &dyn EmbeddingProvider,
    chunks: &'a [Chunk],
    query: &str,
    k: usize,
) -> Vec<&'a Chunk> {
    top_k_by_embedding(chunks, &provider.embed(query), k)
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` when the vectors are empty,
/// differ in length, or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score embedded chunks against `query_vec`, keeping positive scores,
/// best first. Equal scores keep their input order.
pub fn score_by_embedding<'a>(chunks: &'a [Chunk], query_vec: &[f32]) -> Vec<ScoredChunk<'a, f32>> {
    let mut scored: Vec<ScoredChunk<'a, f32>> = chunks
        .iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding()?;
            let score = cosine_similarity(query_vec, embedding);
            (score > 0.0).then_some(ScoredChunk { chunk, score })
        })
        .collect();
    scored.sort_by(|a, b| desc_f32(a.score, b.score));
    scored
}

/// Return at most `k` embedded chunks with positive similarity, best first.
pub fn top_k_by_embedding<'a>(chunks: &'a [Chunk], query_vec: &[f32], k: usize) -> Vec<&'a Chunk> {
    score_by_embedding(chunks, query_vec)
        .into_iter()
        .take(k)
        .map(|s| s.chunk)
        .collect()
}
