//! # docqa
//!
//! A local-first document indexing and question answering pipeline.
//!
//! docqa indexes a personal collection of plain-text and markdown
//! documents into a SQLite-backed vector store, then answers natural
//! language questions using locally retrieved context plus a language
//! model served by Ollama or OpenAI.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐
//! │ docs dir  │──▶│   Indexer    │──▶│  SQLite   │
//! │ .txt/.md  │   │ chunk+embed  │   │  vectors  │
//! └───────────┘   └──────────────┘   └─────┬─────┘
//!                                          │
//!                  ┌───────────┐   ┌───────▼──────┐
//!     question ───▶│ Retriever │──▶│  Assembler   │──▶ answer + citations
//!                  └───────────┘   │  + LLM call  │
//!                                  └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dqa init                      # create the index database
//! dqa reindex                   # chunk + embed the docs directory
//! dqa ask "What is covered?"    # one-shot question
//! dqa chat                      # interactive conversation
//! dqa status                    # index counts and health
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Boundary-aware text chunking |
//! | [`embedding`] | Embedding service boundary |
//! | [`llm`] | Text generation boundary |
//! | [`store`] | SQLite vector store |
//! | [`index`] | Reindex orchestration |
//! | [`retrieve`] | Query-time retrieval |
//! | [`qa`] | Prompt assembly and answering |
//! | [`ask`] | CLI read-path wiring |
//! | [`stats`] | Index status reporting |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod qa;
pub mod retrieve;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
