//! Upstream API clients for RedTalon.
//!
//! The embedder and completer implement the `redtalon_core` service traits,
//! so the cache and engine never see HTTP details. Every network call goes
//! through [`RetryPolicy`]: bounded attempts, doubling backoff, and a hard
//! deadline that cuts the whole operation off.

pub mod anthropic;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicCompleter;
pub use openai::OpenAiEmbedder;
pub use retry::RetryPolicy;
