//! # Classroom RAG
//!
//! Backend for a Google Classroom study assistant. The browser extension
//! scrapes course pages and posts them here; questions are answered by a
//! hosted language model grounded in the most relevant chunks of the
//! course's assignments.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Extension  │──▶│   handler    │──▶│  core: chunk  │
//! │ scrape/chat │   │ Session+Svcs │   │  + retrieve   │
//! └─────────────┘   └──────┬───────┘   └───────────────┘
//!                          │
//!            ┌─────────────┼─────────────┐
//!            ▼             ▼             ▼
//!       ┌─────────┐  ┌──────────┐  ┌───────────┐
//!       │ storage │  │classroom │  │    llm    │
//!       │ SQLite  │  │   REST   │  │  Gemini   │
//!       └─────────┘  └──────────┘  └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Course session state and cache records |
//! | [`storage`] | Namespaced JSON key-value store on SQLite |
//! | [`classroom`] | Classroom REST client (course listing) |
//! | [`llm`] | Language model trait and Gemini client |
//! | [`handler`] | Extension message handling |
//! | [`server`] | HTTP endpoint for the extension |
//!
//! The chunking and retrieval logic lives in `classroom-rag-core` and is
//! re-exported as [`chunk`], [`context`], [`embedding`], and [`retrieve`].

pub mod classroom;
pub mod config;
pub mod db;
pub mod handler;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod server;
pub mod storage;

pub use classroom_rag_core::{chunk, context, embedding, retrieve};
