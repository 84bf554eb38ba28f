//! Text generation boundary.
//!
//! Defines the [`Generator`] trait and the Ollama / OpenAI backends.
//! Unlike embedding calls, generation is never retried internally: a
//! failed completion is surfaced to the caller with a `retryable` flag
//! so the user can decide whether to re-ask.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A text generation model behind a service boundary.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`. A single attempt; errors
    /// propagate with a `retryable` classification and are never
    /// silently retried.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Instantiate the configured generation backend.
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        other => Err(Error::Config(format!("unknown llm provider: {}", other))),
    }
}

/// Generation backend using a local Ollama instance's `/api/generate`.
pub struct OllamaGenerator {
    model: String,
    url: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut options = serde_json::json!({ "temperature": self.temperature });
        if let Some(max) = self.max_tokens {
            options["num_predict"] = serde_json::json!(max);
        }
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options,
        });
        let url = format!("{}/api/generate", self.url);

        let json = send_generation(&self.client, &url, None, &body).await?;

        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| Error::Generation {
                cause: "missing response field".to_string(),
                retryable: false,
            })?;
        non_empty(text)
    }
}

/// Generation backend using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiGenerator {
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        if let Some(max) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }

        let json = send_generation(
            &self.client,
            "https://api.openai.com/v1/chat/completions",
            Some(&self.api_key),
            &body,
        )
        .await?;

        let text = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Generation {
                cause: "missing completion content".to_string(),
                retryable: false,
            })?;
        non_empty(text)
    }
}

async fn send_generation(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let mut request = client.post(url).json(body);
    if let Some(key) = bearer {
        request = request.bearer_auth(key);
    }

    let response = request.send().await.map_err(|e| Error::Generation {
        cause: format!("request to {} failed: {}", url, e),
        retryable: e.is_timeout() || e.is_connect(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(Error::Generation {
            cause: format!("{} error {}: {}", url, status, body_text),
            retryable: status.as_u16() == 429 || status.is_server_error(),
        });
    }

    response.json().await.map_err(|e| Error::Generation {
        cause: format!("invalid response body: {}", e),
        retryable: false,
    })
}

fn non_empty(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Generation {
            cause: "model returned an empty completion".to_string(),
            retryable: false,
        });
    }
    Ok(trimmed.to_string())
}
