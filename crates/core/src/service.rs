//! Service traits for the two network-bound collaborators: the embedding
//! service and the model-completion service.
//!
//! Both sit on the request path, so implementations are expected to carry
//! their own timeout/retry discipline; callers treat any [`UpstreamError`]
//! as a soft failure and degrade rather than abort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// Text → fixed-length numeric vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The service name (e.g., "openai", "mock").
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, UpstreamError>;
}

/// Prompt text (+ system role) → generated analysis text.
#[async_trait]
pub trait Completer: Send + Sync {
    /// The service name (e.g., "anthropic", "mock").
    fn name(&self) -> &str;

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, UpstreamError>;
}

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System-role instruction.
    pub system: String,

    /// User-role prompt (the assembled context).
    pub prompt: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.7
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A completion result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_request_defaults() {
        let req = CompletionRequest::new("system", "prompt");
        assert_eq!(req.max_tokens, 1500);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn max_tokens_builder_overrides_default() {
        let req = CompletionRequest::new("s", "p").with_max_tokens(800);
        assert_eq!(req.max_tokens, 800);
    }
}
