//! Query-time retrieval.
//!
//! Embeds a natural-language question with the same model the index
//! was built with and returns the top-k chunks by cosine similarity.
//! Retrieval never mutates the store.

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::QueryResult;
use crate::store::VectorStore;

pub struct Retriever<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn Embedder,
    config: &'a RetrievalConfig,
}

impl<'a> Retriever<'a> {
    pub fn new(
        store: &'a VectorStore,
        embedder: &'a dyn Embedder,
        config: &'a RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Retrieve the top-k chunks for `query`.
    ///
    /// `k` defaults to the configured value and is clamped to
    /// `[1, max_k]`. An empty index yields an empty result, not an
    /// error. Fails with [`Error::ModelMismatch`] if the index was
    /// built with a different embedding model.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<QueryResult> {
        if let Some(indexed) = self.store.embedding_model().await? {
            if indexed != self.embedder.model_name() {
                return Err(Error::ModelMismatch {
                    indexed,
                    configured: self.embedder.model_name().to_string(),
                });
            }
        }

        let k = clamp_k(k, self.config);
        let query_vec = self.embedder.embed(query).await?;
        let hits = self.store.search(&query_vec, k).await?;

        tracing::debug!(k, hits = hits.len(), "retrieval complete");
        Ok(QueryResult { hits })
    }
}

fn clamp_k(requested: Option<usize>, config: &RetrievalConfig) -> usize {
    requested.unwrap_or(config.default_k).clamp(1, config.max_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RetrievalConfig {
        RetrievalConfig {
            default_k: 3,
            max_k: 20,
        }
    }

    #[test]
    fn test_clamp_k_defaults() {
        assert_eq!(clamp_k(None, &cfg()), 3);
    }

    #[test]
    fn test_clamp_k_bounds() {
        assert_eq!(clamp_k(Some(0), &cfg()), 1);
        assert_eq!(clamp_k(Some(7), &cfg()), 7);
        assert_eq!(clamp_k(Some(500), &cfg()), 20);
    }
}
