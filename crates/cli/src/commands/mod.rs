//! Command implementations for the `redtalon` binary.
//!
//! Each command is a thin wrapper: load config, open the configured store,
//! wire the engine, print. All domain behavior lives in the library crates.

pub mod analyze;
pub mod cleanup;
pub mod feedback;
pub mod init_db;
pub mod parse;
pub mod project;
pub mod stats;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use redtalon_config::AppConfig;
use redtalon_core::{Completer, Embedder, Store};
use redtalon_providers::{AnthropicCompleter, OpenAiEmbedder, RetryPolicy};

/// Load configuration from an explicit path or the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let mut config =
                AppConfig::load_from(path).map_err(|e| format!("Failed to load config: {e}"))?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?),
    }
}

/// Open the store backend named in configuration.
pub(crate) async fn open_store(
    config: &AppConfig,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    Ok(redtalon_store::open_store(&config.store.backend, &config.store.path).await?)
}

/// Build the embedding and completion clients from configuration.
///
/// Construction never touches the network; a missing API key only shows up
/// when a command actually calls the service.
pub(crate) fn build_providers(config: &AppConfig) -> (Arc<dyn Embedder>, Arc<dyn Completer>) {
    let retry = RetryPolicy::new(&config.retry);
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&config.embedding, retry.clone()));
    let completer: Arc<dyn Completer> = Arc::new(AnthropicCompleter::new(&config.completion, retry));
    (embedder, completer)
}

/// Read raw request text from a file, or from stdin when the argument is `-`.
pub(crate) fn read_input(input: &str) -> Result<String, Box<dyn std::error::Error>> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(input).map_err(|e| format!("Failed to read {input}: {e}"))?)
    }
}

/// First 12 characters of a request hash, for compact display.
pub(crate) fn short_hash(hash: &str) -> &str {
    let end = hash.char_indices().nth(12).map_or(hash.len(), |(i, _)| i);
    &hash[..end]
}
