//! Configuration loading, validation, and management for redtalon.
//!
//! Loads configuration from `~/.redtalon/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Every heuristic constant in the engine — similarity thresholds, token
//! ratios, per-hit savings estimates, retention bounds — lives here as a
//! named field so deployments can tune them without touching code.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The root configuration structure.
///
/// Maps directly to `~/.redtalon/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Datastore configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Model-completion service configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Retry/backoff/deadline discipline for network calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Tiered-cache tuning
    #[serde(default)]
    pub cache: CacheConfig,

    /// Context assembly and memory bounds
    #[serde(default)]
    pub context: ContextConfig,

    /// Analysis/feedback pipeline tuning
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind: "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "redtalon.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_embedding_url(),
            model: default_embedding_model(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_completion_url")]
    pub api_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_completion_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_completion_temperature")]
    pub temperature: f32,
}

fn default_completion_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_completion_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_completion_max_tokens() -> u32 {
    1500
}
fn default_completion_temperature() -> f32 {
    0.7
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_completion_url(),
            model: default_completion_model(),
            max_tokens: default_completion_max_tokens(),
            temperature: default_completion_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per call, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff; doubles per retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Hard deadline across all attempts of one call
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    250
}
fn default_deadline_secs() -> u64 {
    30
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum cosine similarity for an L2 hit
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Fixed confidence reported for L3 pattern-context hits
    #[serde(default = "default_pattern_confidence")]
    pub pattern_context_confidence: f64,

    /// Patterns consulted per L3 lookup
    #[serde(default = "default_pattern_limit")]
    pub pattern_lookup_limit: usize,

    /// Token-savings estimate credited per cache hit (not a measurement)
    #[serde(default = "default_tokens_saved_per_hit")]
    pub tokens_saved_per_hit: i64,

    /// Token credit ratio applied to the original size when first storing
    #[serde(default = "default_initial_savings_ratio")]
    pub initial_savings_ratio: f64,

    /// USD price per token used for the cost-saved estimate
    #[serde(default = "default_price_per_token")]
    pub price_per_token: f64,

    /// Initial confidence for patterns first observed during analysis
    #[serde(default = "default_observed_confidence")]
    pub observed_pattern_confidence: f64,

    /// Entry lifetime in hours; absent = no expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_hours: Option<u32>,
}

fn default_similarity_threshold() -> f64 {
    0.95
}
fn default_pattern_confidence() -> f64 {
    0.85
}
fn default_pattern_limit() -> usize {
    10
}
fn default_tokens_saved_per_hit() -> i64 {
    100
}
fn default_initial_savings_ratio() -> f64 {
    0.001
}
fn default_price_per_token() -> f64 {
    0.00001
}
fn default_observed_confidence() -> f64 {
    0.5
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            pattern_context_confidence: default_pattern_confidence(),
            pattern_lookup_limit: default_pattern_limit(),
            tokens_saved_per_hit: default_tokens_saved_per_hit(),
            initial_savings_ratio: default_initial_savings_ratio(),
            price_per_token: default_price_per_token(),
            observed_pattern_confidence: default_observed_confidence(),
            ttl_hours: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Patterns below this confidence stay out of prompts
    #[serde(default = "default_confidence_floor")]
    pub pattern_confidence_floor: f64,

    /// Patterns loaded per project context
    #[serde(default = "default_context_pattern_limit")]
    pub pattern_limit: usize,

    /// Success memories loaded per project context
    #[serde(default = "default_success_limit")]
    pub success_limit: usize,

    /// Learning loops loaded per project context
    #[serde(default = "default_loop_limit")]
    pub loop_limit: usize,

    /// Upper bound on free-text project notes
    #[serde(default = "default_notes_cap")]
    pub notes_cap_chars: usize,

    /// Characters per token for the estimate (approximation, not tokenizer)
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    /// Patterns retained by a prune pass
    #[serde(default = "default_prune_pattern_keep")]
    pub prune_pattern_keep: usize,

    /// Success memories retained by a prune pass
    #[serde(default = "default_prune_success_keep")]
    pub prune_success_keep: usize,

    /// Success-exploit list bound on the project record
    #[serde(default = "default_exploit_keep")]
    pub exploit_keep: usize,
}

fn default_confidence_floor() -> f64 {
    0.7
}
fn default_context_pattern_limit() -> usize {
    20
}
fn default_success_limit() -> usize {
    10
}
fn default_loop_limit() -> usize {
    5
}
fn default_notes_cap() -> usize {
    5000
}
fn default_chars_per_token() -> usize {
    4
}
fn default_prune_pattern_keep() -> usize {
    50
}
fn default_prune_success_keep() -> usize {
    20
}
fn default_exploit_keep() -> usize {
    50
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            pattern_confidence_floor: default_confidence_floor(),
            pattern_limit: default_context_pattern_limit(),
            success_limit: default_success_limit(),
            loop_limit: default_loop_limit(),
            notes_cap_chars: default_notes_cap(),
            chars_per_token: default_chars_per_token(),
            prune_pattern_keep: default_prune_pattern_keep(),
            prune_success_keep: default_prune_success_keep(),
            exploit_keep: default_exploit_keep(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prune pass fires every Nth feedback event
    #[serde(default = "default_prune_interval")]
    pub prune_interval: u64,

    /// Minimum similarity for the "similar past requests" prompt block
    #[serde(default = "default_similar_threshold")]
    pub similar_request_threshold: f64,

    /// Similar requests folded into the prompt
    #[serde(default = "default_similar_limit")]
    pub similar_request_limit: usize,

    /// Fraction of a full analysis credited as future savings when stored
    #[serde(default = "default_fresh_savings_ratio")]
    pub fresh_savings_ratio: f64,
}

fn default_prune_interval() -> u64 {
    10
}
fn default_similar_threshold() -> f64 {
    0.8
}
fn default_similar_limit() -> usize {
    5
}
fn default_fresh_savings_ratio() -> f64 {
    0.9
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prune_interval: default_prune_interval(),
            similar_request_threshold: default_similar_threshold(),
            similar_request_limit: default_similar_limit(),
            fresh_savings_ratio: default_fresh_savings_ratio(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.redtalon/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `REDTALON_EMBEDDING_KEY`, falling back to `OPENAI_API_KEY`
    /// - `REDTALON_COMPLETION_KEY`, falling back to `ANTHROPIC_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Environment variable overrides (highest priority).
    pub fn apply_env_overrides(&mut self) {
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = std::env::var("REDTALON_EMBEDDING_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if self.completion.api_key.is_none() {
            self.completion.api_key = std::env::var("REDTALON_COMPLETION_KEY")
                .ok()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }
        if let Ok(path) = std::env::var("REDTALON_DB") {
            self.store.path = path;
        }
        if let Ok(model) = std::env::var("REDTALON_MODEL") {
            self.completion.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".redtalon")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(ConfigError::ValidationError(
                "cache.similarity_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.engine.similar_request_threshold) {
            return Err(ConfigError::ValidationError(
                "engine.similar_request_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.context.pattern_confidence_floor) {
            return Err(ConfigError::ValidationError(
                "context.pattern_confidence_floor must be between 0.0 and 1.0".into(),
            ));
        }
        if self.completion.temperature < 0.0 || self.completion.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "completion.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.context.chars_per_token == 0 {
            return Err(ConfigError::ValidationError(
                "context.chars_per_token must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.engine.prune_interval == 0 {
            return Err(ConfigError::ValidationError(
                "engine.prune_interval must be at least 1".into(),
            ));
        }
        match self.store.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "store.backend must be \"sqlite\" or \"memory\", got \"{other}\""
                )));
            }
        }
        Ok(())
    }

    /// Default config rendered as TOML, written on first-run provisioning.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
