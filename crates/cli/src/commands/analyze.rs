//! `redtalon analyze` — Run the full analysis pipeline.

use std::path::Path;

use redtalon_core::Error;
use redtalon_engine::Analyzer;

pub async fn run(
    config_path: Option<&Path>,
    input: &str,
    project: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let raw = super::read_input(input)?;

    let store = super::open_store(&config).await?;
    let (embedder, completer) = super::build_providers(&config);
    let analyzer = Analyzer::new(store, embedder, completer, config);

    let report = match analyzer.analyze(project, &raw).await {
        Ok(report) => report,
        Err(Error::NotFound { .. }) => {
            eprintln!("❌ Project '{project}' not found.");
            eprintln!("   Create it first: redtalon project new {project} --name \"{project}\"");
            return Err(format!("unknown project: {project}").into());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "🔍 Analysis — {} {}",
        report.compression.method, report.compression.endpoint
    );
    println!("─────────────────────────────────────");
    println!("  Project:     {}", report.project_id);
    println!("  Hash:        {}", super::short_hash(&report.request_hash));
    println!("  Category:    {}", report.compression.category);
    println!("  Tier:        {} ({} cost)", report.tier, report.cost.as_str());
    println!("  Confidence:  {:.0}%", report.confidence * 100.0);
    println!(
        "  Compression: {} → {} bytes ({:.0}%)",
        report.compression.original_size,
        report.compression.compressed_size,
        report.compression.compression_ratio * 100.0
    );
    if !report.compression.patterns.is_empty() {
        println!("  Patterns:    {}", report.compression.patterns.join(", "));
    }
    if report.similar_requests > 0 {
        println!("  Similar:     {} past analyses", report.similar_requests);
    }
    if report.tokens_saved > 0 {
        println!("  Tokens saved: {}", report.tokens_saved);
    }
    if let Some(estimate) = report.prompt_tokens_estimate {
        println!("  Prompt size: ~{estimate} tokens");
    }

    if report.degraded {
        println!();
        println!("⚠️  Completion service unreachable — assembled context returned instead.");
    }

    println!();
    match (&report.analysis, &report.context) {
        (Some(analysis), _) => println!("{analysis}"),
        (None, Some(context)) => println!("{context}"),
        (None, None) => {}
    }

    Ok(())
}
