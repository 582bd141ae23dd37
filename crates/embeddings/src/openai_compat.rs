//! OpenAI-compatible embedding provider.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any endpoint
//! exposing `POST {base_url}/embeddings`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tof_core::embedding::Embedder;
use tof_core::error::EmbeddingError;
use tracing::{debug, warn};

/// An embedder backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// `model_id` is the embedding-space identity stored with vectors;
/// `model` is the upstream model name sent in the request.
pub struct OpenAiCompatEmbedder {
    model_id: String,
    model: String,
    dimensions: usize,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatEmbedder {
    pub fn new(
        model_id: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            model_id: model_id.into(),
            model: model.into(),
            dimensions,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiCompatEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
            "encoding_format": "float",
        });

        debug!(model_id = %self.model_id, model = %self.model, "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(EmbeddingError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(EmbeddingError::AuthenticationFailed("Invalid API key".into()));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Embedding provider returned error");
            return Err(EmbeddingError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| EmbeddingError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        api_resp
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::ApiError {
                status_code: 200,
                message: "No embeddings in response".into(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
