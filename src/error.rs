//! Crate-wide error taxonomy.
//!
//! External-service failures carry a `retryable` flag classified by
//! cause: timeouts, connection resets, and HTTP 429/5xx are retryable;
//! malformed responses, auth failures, and other 4xx are not. Embedding
//! calls are retried internally with backoff ([`crate::embedding`]);
//! generation failures are surfaced to the caller without retry.

/// Errors produced by the indexing and retrieval pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration. Fatal to the call, never retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The embedding service call failed or timed out.
    #[error("embedding service error: {cause}")]
    EmbeddingService { cause: String, retryable: bool },

    /// The text generation backend failed or timed out.
    #[error("generation error: {cause}")]
    Generation { cause: String, retryable: bool },

    /// I/O failure reading or writing the index database.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The index was built with a different embedding model than the
    /// one currently configured. Vectors from different models must
    /// never be mixed; a forced full reindex rebuilds the index.
    #[error(
        "embedding model mismatch: index built with '{indexed}', configured '{configured}' \
         (run `dqa reindex --force` to rebuild)"
    )]
    ModelMismatch { indexed: String, configured: String },

    /// Stored vectors have a different dimensionality than the query
    /// vector. Usually means `embedding.dims` changed without a
    /// rebuild.
    #[error(
        "embedding dimension mismatch: index has {indexed}-dim vectors, query has {configured} \
         (run `dqa reindex --force` to rebuild)"
    )]
    DimsMismatch { indexed: usize, configured: usize },
}

impl Error {
    /// Whether the failure is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::EmbeddingService { retryable, .. } | Error::Generation { retryable, .. } => {
                *retryable
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
