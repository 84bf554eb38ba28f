//! Embedding service boundary.
//!
//! Defines the [`Embedder`] trait and the concrete backends:
//! - **[`OllamaEmbedder`]** — calls a local Ollama instance's
//!   `/api/embed` endpoint.
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API with the
//!   key from `OPENAI_API_KEY`.
//!
//! Both backends batch their inputs, enforce the configured timeout,
//! and validate that every returned vector has the configured
//! dimensionality — vectors from different models must never be mixed
//! in one store, so a dimension mismatch is a hard error.
//!
//! # Retry Strategy
//!
//! Transient failures are retried with exponential backoff (1s, 2s,
//! 4s, ... capped at 32s) up to `max_retries` attempts:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - network errors (timeout, connection reset) → retry
//! - other 4xx and malformed responses → fail immediately,
//!   `retryable: false`
//!
//! Also provides the vector utilities shared with the store:
//! [`vec_to_blob`], [`blob_to_vec`], and [`cosine_similarity`].

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// An embedding model behind a service boundary.
///
/// Identical text under the same model configuration yields the same
/// vector across calls (assuming the underlying model is
/// deterministic). `embed_batch` preserves input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, recorded in the index for mismatch detection.
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a search query).
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::EmbeddingService {
            cause: "empty embedding response".to_string(),
            retryable: false,
        })
    }
}

/// Instantiate the configured embedding backend.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => Err(Error::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Ollama ============

/// Embedding backend using a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let url = format!("{}/api/embed", self.url);

        let json = request_with_retry(&self.client, &url, None, &body, self.max_retries).await?;

        let embeddings = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| malformed("missing embeddings array"))?;

        let vectors = embeddings
            .iter()
            .map(|embedding| {
                embedding
                    .as_array()
                    .map(|values| {
                        values
                            .iter()
                            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                            .collect::<Vec<f32>>()
                    })
                    .ok_or_else(|| malformed("embedding is not an array"))
            })
            .collect::<Result<Vec<_>>>()?;

        check_dims(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

// ============ OpenAI ============

/// Embedding backend using the OpenAI embeddings API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = request_with_retry(
            &self.client,
            "https://api.openai.com/v1/embeddings",
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;

        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| malformed("missing data array"))?;

        let vectors = data
            .iter()
            .map(|item| {
                item.get("embedding")
                    .and_then(|e| e.as_array())
                    .map(|values| {
                        values
                            .iter()
                            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                            .collect::<Vec<f32>>()
                    })
                    .ok_or_else(|| malformed("missing embedding"))
            })
            .collect::<Result<Vec<_>>>()?;

        check_dims(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

// ============ Shared transport ============

/// POST a JSON body with bounded exponential-backoff retry.
///
/// Retries 429/5xx and network errors; other 4xx fail immediately.
async fn request_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err: Option<Error> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
            tracing::warn!(url, attempt, "retrying embedding request");
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json().await.map_err(|e| Error::EmbeddingService {
                        cause: format!("invalid response body: {}", e),
                        retryable: false,
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let cause = format!("{} error {}: {}", url, status, body_text);

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(Error::EmbeddingService {
                        cause,
                        retryable: true,
                    });
                    continue;
                }

                // Client error (auth, bad request) — not worth retrying.
                return Err(Error::EmbeddingService {
                    cause,
                    retryable: false,
                });
            }
            Err(e) => {
                last_err = Some(Error::EmbeddingService {
                    cause: format!("request to {} failed: {}", url, e),
                    retryable: e.is_timeout() || e.is_connect(),
                });
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::EmbeddingService {
        cause: "embedding failed after retries".to_string(),
        retryable: true,
    }))
}

fn malformed(detail: &str) -> Error {
    Error::EmbeddingService {
        cause: format!("invalid embedding response: {}", detail),
        retryable: false,
    }
}

fn check_dims(vectors: &[Vec<f32>], expected_count: usize, dims: usize) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(Error::EmbeddingService {
            cause: format!(
                "expected {} embeddings, got {}",
                expected_count,
                vectors.len()
            ),
            retryable: false,
        });
    }
    for v in vectors {
        if v.len() != dims {
            return Err(Error::EmbeddingService {
                cause: format!("embedding has {} dims, expected {}", v.len(), dims),
                retryable: false,
            });
        }
    }
    Ok(())
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB of little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), vec.len() * 4);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_dims_check() {
        let vectors = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert!(check_dims(&vectors, 2, 2).is_ok());
        assert!(check_dims(&vectors, 3, 2).is_err());
        let err = check_dims(&vectors, 2, 3).unwrap_err();
        assert!(!err.is_retryable());
    }
}
