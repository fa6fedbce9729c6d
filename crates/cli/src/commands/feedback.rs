//! `redtalon feedback` — Record a test outcome.

use std::path::Path;

use clap::Args;
use redtalon_core::{Category, Error, Outcome, TestResult};
use redtalon_engine::FeedbackLoop;

#[derive(Args)]
pub struct FeedbackArgs {
    /// Project the test belongs to
    #[arg(short, long)]
    project: String,

    /// Endpoint the test was run against
    #[arg(short, long)]
    endpoint: String,

    /// What was actually tried
    #[arg(short, long)]
    test: String,

    /// How it went
    #[arg(short, long, value_parser = ["success", "partial", "failure", "inconclusive"])]
    outcome: String,

    /// Request category; anything unrecognized counts as UNKNOWN
    #[arg(long, default_value = "UNKNOWN")]
    category: String,

    /// Hash of the analyzed request the test came from
    #[arg(long, value_name = "HASH")]
    request_hash: Option<String>,

    /// What happened, in your own words
    #[arg(short, long)]
    notes: Option<String>,

    /// Pattern involved in the test (repeat for several)
    #[arg(long = "pattern", value_name = "NAME")]
    patterns: Vec<String>,

    /// A new pattern discovered during the test
    #[arg(long, value_name = "NAME")]
    discovered: Option<String>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    args: FeedbackArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_store(&config).await?;
    let feedback = FeedbackLoop::new(store, config);

    let result = TestResult {
        project_id: args.project.clone(),
        request_hash: args.request_hash,
        endpoint: args.endpoint,
        category: Category::from_name(&args.category),
        test_performed: args.test,
        outcome: Outcome::from_name(&args.outcome),
        notes: args.notes,
        patterns: args.patterns,
        discovered_pattern: args.discovered,
    };

    let report = match feedback.submit(result).await {
        Ok(report) => report,
        Err(Error::NotFound { .. }) => {
            eprintln!("❌ Project '{}' not found.", args.project);
            eprintln!(
                "   Create it first: redtalon project new {} --name \"{}\"",
                args.project, args.project
            );
            return Err(format!("unknown project: {}", args.project).into());
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📤 Feedback recorded — {}", report.outcome);
    println!("─────────────────────────────────────");
    println!(
        "  Memory:   {}",
        if report.memory_updated {
            "updated"
        } else {
            "unchanged"
        }
    );
    if report.pruned {
        println!("  Pruned:   retention pass ran");
    }
    println!(
        "  Learning: {} tests — {} success / {} failure / {} partial ({}% success)",
        report.stats.total,
        report.stats.success,
        report.stats.failure,
        report.stats.partial,
        report.stats.success_rate
    );
    for suggestion in &report.suggestions {
        println!();
        println!("💡 Next: {suggestion}");
    }

    Ok(())
}
