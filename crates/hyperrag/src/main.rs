//! hyperrag - hypergraph retrieval-augmented generation
//!
//! Main entry point for the hyperrag CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use hyperrag_config::{HyperragConfig, LoggingConfig};

mod commands;

use commands::{db, ingest, profiles, query};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// hyperrag - hypergraph retrieval-augmented generation over your documents
#[derive(Parser)]
#[command(name = "hyperrag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this config file instead of layered discovery
    #[arg(short, long, global = true, env = "HYPERRAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the project-local hyperrag.toml (default: current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Knowledge base to use (default: [storage] database)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a hypergraph from documents into a knowledge base
    Ingest(ingest::IngestArgs),

    /// Ask a question against a knowledge base
    Query(query::QueryArgs),

    /// Manage knowledge bases
    Db(db::DbArgs),

    /// Inspect domain profiles
    Profiles(profiles::ProfilesArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources, warnings) = match &cli.config {
        Some(path) => {
            let config = hyperrag_config::load_config_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            (config, vec![path.clone()], Vec::new())
        }
        None => {
            let loaded =
                hyperrag_config::load_config_with_options(cli.project_dir.as_deref(), None)?;
            let sources: Vec<PathBuf> =
                loaded.loaded_from().into_iter().map(Path::to_path_buf).collect();
            (loaded.config, sources, loaded.warnings)
        }
    };

    let _guard = init_tracing(&config, cli.verbose);
    tracing::debug!(?sources, "Configuration loaded");
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    config.validate()?;

    let database = cli
        .database
        .unwrap_or_else(|| config.storage().database);

    let ctx = commands::Context {
        config,
        project_dir: cli.project_dir,
        database,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Ingest(args) => ingest::run(args, &ctx).await,
        Commands::Query(args) => query::run(args, &ctx).await,
        Commands::Db(args) => db::run(args, &ctx).await,
        Commands::Profiles(args) => profiles::run(args, &ctx).await,
    }
}

const CRATES: [&str; 5] = [
    "hyperrag",
    "hyperrag_engine",
    "hyperrag_graph",
    "hyperrag_llm",
    "hyperrag_config",
];

fn directives(level: &str, rest: &str) -> String {
    let mut parts: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    parts.push(rest.to_string());
    parts.join(",")
}

/// Console (human-readable, stderr) plus an optional daily-rolling JSON file.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &HyperragConfig, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let logging = config.logging();
    let console_filter = if verbose {
        directives("debug", "info")
    } else {
        directives(&logging.level, "warn")
    };

    let mut guard = None;
    let file_layer = if logging.file {
        let log_dir = log_dir(config, &logging);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "hyperrag.log");
        let (non_blocking, g) = tracing_appender::non_blocking(file_appender);
        guard = Some(g);
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(directives("trace", "info"))),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(console_filter)),
        )
        .with(file_layer)
        .init();

    guard
}

fn log_dir(config: &HyperragConfig, logging: &LoggingConfig) -> PathBuf {
    logging
        .dir
        .clone()
        .unwrap_or_else(|| config.storage().effective_data_dir().join("logs"))
}
