//! Core data types used throughout docqa.
//!
//! These types represent the documents, chunks, and results that flow
//! through the indexing and retrieval pipeline.

use std::path::PathBuf;

/// A source document read from the docs directory.
///
/// Identified by its path relative to the docs root. Never mutated in
/// place: a changed file is re-read, re-hashed, and its index entries
/// replaced wholesale.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identifier: path relative to the docs root.
    pub id: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Full file contents.
    pub body: String,
    /// File modification time (Unix seconds).
    pub modified_at: i64,
    /// SHA-256 of the body, hex encoded.
    pub content_hash: String,
}

/// A contiguous span of a document's body, the unit of embedding and
/// retrieval. Immutable once created.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub document_id: String,
    /// Sequence index within the document, contiguous from 0.
    pub chunk_index: i64,
    pub text: String,
    /// Content hash of the document this chunk was derived from,
    /// used for staleness detection.
    pub document_hash: String,
}

/// A chunk plus its embedding vector, as persisted in the store.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned from similarity search, with its cosine score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Cosine similarity to the query vector, in `[-1.0, 1.0]`.
    pub score: f32,
}

impl RetrievedChunk {
    /// Citation identifier: `"document_id#chunk_index"`.
    pub fn id(&self) -> String {
        format!("{}#{}", self.document_id, self.chunk_index)
    }
}

/// Ranked retrieval result for one query. Ephemeral, never persisted.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Hits sorted by descending score, at most `k` of them.
    pub hits: Vec<RetrievedChunk>,
}

/// One question/answer exchange, kept in memory for the session.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub cited_chunk_ids: Vec<String>,
}

/// Summary of a reindex run.
#[derive(Debug, Default)]
pub struct ReindexReport {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub unchanged: u64,
    /// `(document_id, error)` pairs for documents that could not be
    /// indexed. Failures do not abort the run.
    pub failed: Vec<(String, String)>,
}

/// Index counts reported by `dqa status`.
#[derive(Debug)]
pub struct IndexStatus {
    pub documents: i64,
    pub entries: i64,
    /// Embedding model the index was built with, if any.
    pub embedding_model: Option<String>,
}
