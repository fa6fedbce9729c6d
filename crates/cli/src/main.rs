//! RedTalon CLI — the main entry point.
//!
//! Commands:
//! - `parse`    — Compress a raw request offline, no store or network
//! - `analyze`  — Run the full analysis pipeline for a project
//! - `feedback` — Record a test outcome so future analyses learn from it
//! - `stats`    — Show cache and learning statistics for a project
//! - `project`  — Create or inspect projects
//! - `cleanup`  — Remove expired cache entries
//! - `init-db`  — Create the database and schema

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "redtalon",
    about = "RedTalon — request analysis assistant for security testers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (default: ~/.redtalon/config.toml)
    #[arg(long, global = true, env = "REDTALON_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a raw HTTP request offline and print the result
    Parse {
        /// File with the raw request text, or `-` for stdin
        input: String,

        /// Print the parsed request as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze a raw HTTP request through cache, context, and model
    Analyze {
        /// File with the raw request text, or `-` for stdin
        input: String,

        /// Project the request belongs to
        #[arg(short, long)]
        project: String,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record the outcome of a test against an analyzed request
    Feedback(commands::feedback::FeedbackArgs),

    /// Show cache and learning statistics for a project
    Stats {
        /// Project to summarize
        #[arg(short, long)]
        project: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Remove expired cache entries
    Cleanup,

    /// Create the database and schema
    InitDb,
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project
    New {
        /// Project id used by analyze and feedback
        id: String,

        /// Human-readable name
        #[arg(short, long)]
        name: String,

        /// Target domain (e.g. shop.example.com)
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Show a project's memory and counters
    Show {
        /// Project id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Parse { input, json } => commands::parse::run(&input, json)?,
        Commands::Analyze {
            input,
            project,
            json,
        } => commands::analyze::run(config_path, &input, &project, json).await?,
        Commands::Feedback(args) => commands::feedback::run(config_path, args).await?,
        Commands::Stats { project, json } => {
            commands::stats::run(config_path, &project, json).await?
        }
        Commands::Project { action } => match action {
            ProjectAction::New { id, name, domain } => {
                commands::project::new(config_path, &id, &name, domain.as_deref()).await?
            }
            ProjectAction::Show { id } => commands::project::show(config_path, &id).await?,
        },
        Commands::Cleanup => commands::cleanup::run(config_path).await?,
        Commands::InitDb => commands::init_db::run(config_path).await?,
    }

    Ok(())
}
