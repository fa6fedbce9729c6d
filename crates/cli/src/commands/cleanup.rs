//! `redtalon cleanup` — Remove expired cache entries.

use std::path::Path;

use redtalon_engine::Analyzer;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_store(&config).await?;
    let (embedder, completer) = super::build_providers(&config);
    let analyzer = Analyzer::new(store, embedder, completer, config);

    let removed = analyzer.cleanup_expired().await?;
    if removed == 0 {
        println!("✅ Nothing to clean up — no expired cache entries.");
    } else {
        println!("🗑️  Removed {removed} expired cache entries.");
    }

    Ok(())
}
