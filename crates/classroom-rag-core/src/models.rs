//! Core data models for the chunking and retrieval pipeline.
//!
//! A [`Chunk`] is the unit of retrievable text: a bounded slice of a
//! source document tagged with its course, source, and position. Chunks
//! are created fresh by [`make_chunk_objects`](crate::chunk::make_chunk_objects)
//! and never mutated in place by this crate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Title assigned to chunks whose source has no title.
pub const UNTITLED: &str = "Untitled";

/// Sizing knobs for [`chunk_text`](crate::chunk::chunk_text).
///
/// All sizes are counted in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Soft cap per chunk. Also the window size when slicing oversized paragraphs.
    pub max_chars: usize,
    /// Chunks shorter than this are merged into their predecessor.
    pub min_chars: usize,
    /// Paragraphs strictly longer than this are force-sliced.
    pub hard_max_chars: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chars: 1800,
            min_chars: 250,
            hard_max_chars: 2400,
        }
    }
}

/// Input to the chunk-record builder: one source document and the keys
/// that scope it.
#[derive(Debug, Clone, Default)]
pub struct ChunkSource {
    pub course_id: String,
    pub source_id: String,
    pub title: Option<String>,
    pub text: String,
    /// Caller-supplied metadata merged onto every produced record.
    pub extra_meta: Map<String, Value>,
    pub chunk_opts: ChunkOptions,
}

/// Retrieval capability of a chunk.
///
/// A chunk is either lexical-only or carries an embedding produced by some
/// external step. Vector retrieval only considers `Embedded` chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<f32>>", into = "Option<Vec<f32>>")]
pub enum ChunkVector {
    #[default]
    Lexical,
    Embedded(Vec<f32>),
}

impl ChunkVector {
    pub fn is_lexical(&self) -> bool {
        matches!(self, ChunkVector::Lexical)
    }
}

impl From<Option<Vec<f32>>> for ChunkVector {
    fn from(v: Option<Vec<f32>>) -> Self {
        match v {
            Some(v) => ChunkVector::Embedded(v),
            None => ChunkVector::Lexical,
        }
    }
}

impl From<ChunkVector> for Option<Vec<f32>> {
    fn from(v: ChunkVector) -> Self {
        match v {
            ChunkVector::Lexical => None,
            ChunkVector::Embedded(v) => Some(v),
        }
    }
}

/// A chunk of a source document's text.
///
/// Serializes to a flat camelCase record; `extra` keys sit alongside the
/// fixed fields and `embedding` is present only for embedded chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// `<courseId>::<sourceId>::<chunkIndex>`.
    pub id: String,
    pub course_id: String,
    pub source_id: String,
    pub title: String,
    /// Zero-based position within the source document.
    pub chunk_index: usize,
    pub text: String,
    #[serde(
        default,
        rename = "embedding",
        skip_serializing_if = "ChunkVector::is_lexical"
    )]
    pub vector: ChunkVector,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chunk {
    /// Merge caller metadata onto the record, caller keys last.
    ///
    /// A key naming a fixed field overrides that field when the value has
    /// the field's type (a string, a non-negative integer for `chunkIndex`,
    /// a number array or `null` for `embedding`); otherwise it is dropped,
    /// since the record cannot carry the same key twice. Every other key
    /// lands in `extra`.
    pub fn apply_meta(&mut self, meta: &Map<String, Value>) {
        for (key, value) in meta {
            let field = match key.as_str() {
                "id" => Some(&mut self.id),
                "courseId" => Some(&mut self.course_id),
                "sourceId" => Some(&mut self.source_id),
                "title" => Some(&mut self.title),
                "text" => Some(&mut self.text),
                _ => None,
            };
            if let Some(field) = field {
                if let Some(s) = value.as_str() {
                    *field = s.to_string();
                }
                continue;
            }

            match key.as_str() {
                "chunkIndex" => {
                    if let Some(n) = value.as_u64() {
                        self.chunk_index = n as usize;
                    }
                }
                "embedding" => {
                    if let Ok(v) = serde_json::from_value::<Option<Vec<f32>>>(value.clone()) {
                        self.vector = ChunkVector::from(v);
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Returns a copy of this chunk carrying `embedding`.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.vector = ChunkVector::Embedded(embedding);
        self
    }

    /// The attached embedding, if the chunk has one.
    pub fn embedding(&self) -> Option<&[f32]> {
        match &self.vector {
            ChunkVector::Embedded(v) => Some(v),
            ChunkVector::Lexical => None,
        }
    }
}

/// Deterministic chunk id from its three key components.
pub fn chunk_id(course_id: &str, source_id: &str, chunk_index: usize) -> String {
    format!("{}::{}::{}", course_id, source_id, chunk_index)
}
