//! OpenAI embeddings client.
//!
//! Calls the `/embeddings` endpoint of any OpenAI-compatible host with
//! Bearer authentication. Digests are short, so a single input per request
//! is enough; batching is not worth the complexity here.

use async_trait::async_trait;
use redtalon_config::EmbeddingConfig;
use redtalon_core::{Embedder, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Embedding client for OpenAI-compatible APIs.
pub struct OpenAiEmbedder {
    api_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
            retry,
        }
    }

    /// Point at a different base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn embed_once(
        &self,
        api_key: &str,
        text: &str,
    ) -> std::result::Result<Vec<f32>, UpstreamError> {
        let url = format!("{}/embeddings", self.api_url);
        let body = EmbeddingsRequest {
            model: &self.model,
            input: text,
        };

        debug!(service = "openai", model = %self.model, chars = text.len(), "Requesting embedding");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(e.to_string())
                } else {
                    UpstreamError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(UpstreamError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(UpstreamError::AuthenticationFailed(
                "Invalid embedding API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Embedding API error");
            return Err(UpstreamError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(format!("embedding response: {e}")))?;

        first_embedding(api_resp)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::NotConfigured("embedding API key missing".into()))?;

        self.retry
            .run("embedding", || self.embed_once(api_key, text))
            .await
    }
}

fn first_embedding(resp: EmbeddingsResponse) -> std::result::Result<Vec<f32>, UpstreamError> {
    resp.data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| UpstreamError::InvalidResponse("empty embedding data".into()))
}

// --- OpenAI API types ---

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use redtalon_config::RetryConfig;

    fn embedder(api_key: Option<&str>) -> OpenAiEmbedder {
        let config = EmbeddingConfig {
            api_key: api_key.map(String::from),
            api_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
        };
        OpenAiEmbedder::new(&config, RetryPolicy::new(&RetryConfig::default()))
    }

    #[test]
    fn constructor() {
        let e = embedder(Some("sk-test"));
        assert_eq!(e.name(), "openai");
        assert_eq!(e.api_url, "https://api.openai.com/v1");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let e = embedder(Some("sk-test")).with_base_url("http://localhost:9000/v1/");
        assert_eq!(e.api_url, "http://localhost:9000/v1");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let e = embedder(None);
        let result = e.embed("some digest").await;
        assert!(matches!(result, Err(UpstreamError::NotConfigured(_))));
    }

    #[test]
    fn parse_embeddings_response() {
        let resp: EmbeddingsResponse = serde_json::from_str(
            r#"{
                "object": "list",
                "data": [{"object": "embedding", "embedding": [0.1, -0.2, 0.3], "index": 0}],
                "model": "text-embedding-3-small",
                "usage": {"prompt_tokens": 8, "total_tokens": 8}
            }"#,
        )
        .unwrap();

        let embedding = first_embedding(resp).unwrap();
        assert_eq!(embedding.len(), 3);
        assert!((embedding[1] + 0.2).abs() < 1e-6);
    }

    #[test]
    fn empty_data_is_invalid() {
        let resp: EmbeddingsResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(matches!(
            first_embedding(resp),
            Err(UpstreamError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_serializes_model_and_input() {
        let body = EmbeddingsRequest {
            model: "text-embedding-3-small",
            input: "POST /checkout",
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"model\":\"text-embedding-3-small\""));
        assert!(json.contains("\"input\":\"POST /checkout\""));
    }
}
