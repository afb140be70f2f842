//! # Classroom RAG Core
//!
//! Pure, synchronous logic for Classroom RAG: chunk models, the text
//! normalizer and paragraph chunker, keyword and vector retrieval, and
//! prompt context assembly.
//!
//! Nothing in this crate performs I/O or holds shared state, so every
//! function can be called concurrently from independent call sites.
//! Malformed or empty input degrades to empty results or zero scores
//! rather than errors.
//!
//! ## Pipeline
//!
//! ```text
//! page text ─▶ normalize ─▶ chunk ─▶ Chunk records ─▶ top-K ─▶ context ─▶ prompt
//! ```
//!
//! ```rust
//! use classroom_rag_core::chunk::make_chunk_objects;
//! use classroom_rag_core::models::ChunkSource;
//! use classroom_rag_core::retrieve::top_k_by_keyword;
//!
//! let chunks = make_chunk_objects(&ChunkSource {
//!     course_id: "course1".into(),
//!     source_id: "syllabus".into(),
//!     title: Some("Syllabus".into()),
//!     text: "Homework is due Friday.\n\nLabs meet on Tuesday.".into(),
//!     ..Default::default()
//! });
//! let hits = top_k_by_keyword(&chunks, "homework due", 5);
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].id, "course1::syllabus::0");
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod models;
pub mod retrieve;
