//! `redtalon project` — Create and inspect projects.
//!
//! Analyses and feedback are always scoped to a project; both refuse ids
//! that were never created here.

use std::path::Path;

use redtalon_core::ProjectRecord;

pub async fn new(
    config_path: Option<&Path>,
    id: &str,
    name: &str,
    domain: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_store(&config).await?;

    if store.get_project(id).await?.is_some() {
        println!("⚠️  Project '{id}' already exists.");
        return Ok(());
    }

    let mut project = ProjectRecord::new(id, name);
    project.domain = domain.map(String::from);
    store.create_project(project).await?;

    println!("✅ Project '{id}' created.");
    println!("   Analyze a request: redtalon analyze request.txt --project {id}");

    Ok(())
}

pub async fn show(config_path: Option<&Path>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_store(&config).await?;

    let Some(project) = store.get_project(id).await? else {
        eprintln!("❌ Project '{id}' not found.");
        return Err(format!("unknown project: {id}").into());
    };

    println!("📁 {} — {}", project.id, project.name);
    println!("─────────────────────────────────────");
    if let Some(domain) = &project.domain {
        println!("  Domain:    {domain}");
    }
    println!("  Created:   {}", project.created_at.format("%Y-%m-%d"));
    println!("  Analyzed:  {} requests", project.requests_analyzed);
    println!("  Saved:     {} tokens", project.tokens_saved);
    println!(
        "  Outcomes:  {} success / {} failure / {} partial",
        project.success_count, project.failure_count, project.partial_count
    );
    if !project.learned_patterns.is_empty() {
        println!("  Patterns:  {}", project.learned_patterns.join(", "));
    }
    if !project.success_exploits.is_empty() {
        println!();
        println!("  Confirmed exploits:");
        for exploit in &project.success_exploits {
            println!("    ✓ {exploit}");
        }
    }
    if !project.ai_context_notes.is_empty() {
        println!();
        println!("  Notes:");
        for line in project.ai_context_notes.lines() {
            println!("    {line}");
        }
    }

    Ok(())
}
