//! `redtalon stats` — Cache and learning statistics for a project.

use std::path::Path;

use redtalon_engine::{Analyzer, FeedbackLoop};

pub async fn run(
    config_path: Option<&Path>,
    project: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_store(&config).await?;
    let (embedder, completer) = super::build_providers(&config);

    let analyzer = Analyzer::new(store.clone(), embedder, completer, config.clone());
    let feedback = FeedbackLoop::new(store, config);

    let cache = analyzer.cache_stats(project).await?;
    let learning = feedback.learning_stats(project).await;

    if json {
        let out = serde_json::json!({
            "project": project,
            "cache": cache,
            "learning": learning,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("📊 Stats — {project}");
    println!("─────────────────────────────────────");
    println!("  Cache:");
    if cache.tiers.is_empty() {
        println!("    No cached analyses yet.");
    }
    for tier in &cache.tiers {
        println!(
            "    L{}: {} entries, {} hits, {} tokens saved",
            tier.level, tier.entries, tier.hits, tier.tokens_saved
        );
    }
    println!(
        "    Total: {} entries, {} hits",
        cache.total_entries, cache.total_hits
    );
    println!(
        "    Saved: {} tokens (~${:.4})",
        cache.total_tokens_saved, cache.estimated_cost_saved
    );
    println!();
    println!("  Learning:");
    println!(
        "    Tests: {} ({} success / {} failure / {} partial)",
        learning.total, learning.success, learning.failure, learning.partial
    );
    println!("    Success rate: {}%", learning.success_rate);

    Ok(())
}
