//! Anthropic completion client.
//!
//! Uses the native Messages API: `x-api-key` header authentication (not
//! Bearer), an `anthropic-version` header, and the system prompt as a
//! top-level field. The assembled context travels as a single user message;
//! text content blocks are joined and non-text blocks ignored.

use async_trait::async_trait;
use redtalon_config::CompletionConfig;
use redtalon_core::{Completer, Completion, CompletionRequest, Usage, UpstreamError};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Completion client for Anthropic's Messages API.
pub struct AnthropicCompleter {
    api_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl AnthropicCompleter {
    pub fn new(config: &CompletionConfig, retry: RetryPolicy) -> Self {
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

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [{"role": "user", "content": request.prompt}],
        })
    }

    async fn complete_once(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, UpstreamError> {
        let url = format!("{}/v1/messages", self.api_url);
        let body = self.request_body(request);

        debug!(service = "anthropic", model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
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
                "Invalid Anthropic API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(UpstreamError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(format!("messages response: {e}")))?;

        Ok(into_completion(api_resp))
    }
}

#[async_trait]
impl Completer for AnthropicCompleter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::NotConfigured("completion API key missing".into()))?;

        self.retry
            .run("completion", || self.complete_once(api_key, &request))
            .await
    }
}

fn into_completion(resp: MessagesResponse) -> Completion {
    let mut text = String::new();
    for block in &resp.content {
        if let ResponseBlock::Text { text: t } = block {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(t);
        }
    }

    let usage = resp.usage.map(|u| Usage {
        prompt_tokens: u.input_tokens,
        completion_tokens: u.output_tokens,
        total_tokens: u.input_tokens + u.output_tokens,
    });

    Completion {
        text,
        model: resp.model,
        usage,
    }
}

// --- Anthropic API types ---

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}
