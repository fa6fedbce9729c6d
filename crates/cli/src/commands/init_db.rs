//! `redtalon init-db` — Create the database and schema.
//!
//! Opening the SQLite store runs the migrations, so most of the work is
//! just an explicit first-time open with friendly output. When no config
//! file exists yet a starter one is written alongside the database.

use std::path::Path;

use redtalon_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    // Starter config, unless the caller pointed at an explicit file.
    if config_path.is_none() {
        let default_path = AppConfig::config_dir().join("config.toml");
        if !default_path.exists() {
            if let Some(parent) = default_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
            }
            std::fs::write(&default_path, AppConfig::default_toml())
                .map_err(|e| format!("Failed to write {}: {e}", default_path.display()))?;
            println!("📁 Wrote starter config to {}", default_path.display());
        }
    }

    let config = super::load_config(config_path)?;

    if config.store.backend != "sqlite" {
        println!(
            "⚠️  Configured backend is '{}' — nothing to initialize.",
            config.store.backend
        );
        return Ok(());
    }

    let store = super::open_store(&config).await?;

    println!(
        "✅ Database ready at {} ({} backend).",
        config.store.path,
        store.name()
    );
    println!("   Next: redtalon project new <id> --name <name>");

    Ok(())
}
