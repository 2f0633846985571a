//! Db command - manage named knowledge bases.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};

use hyperrag_config::HyperragConfig;

use super::Context;

/// Arguments for the db command.
#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// List knowledge bases in the data directory
    List,

    /// Make a knowledge base the default for this project
    Select {
        /// Database name
        name: String,
    },

    /// Show size and quality counters of a knowledge base
    Stats {
        /// Database name (default: the active database)
        name: Option<String>,
    },

    /// Delete a knowledge base
    Delete {
        /// Database name
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Run the db command.
pub async fn run(args: DbArgs, ctx: &Context) -> Result<()> {
    match args.command {
        DbCommand::List => cmd_list(ctx),
        DbCommand::Select { name } => cmd_select(&name, ctx),
        DbCommand::Stats { name } => cmd_stats(name.as_deref(), ctx),
        DbCommand::Delete { name, yes } => cmd_delete(&name, yes, ctx),
    }
}

fn cmd_list(ctx: &Context) -> Result<()> {
    let store = ctx.store();
    let databases = store.list()?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&databases)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Knowledge Bases").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();
    if databases.is_empty() {
        println!(
            "{}",
            dim.apply_to(format!("No databases in {}", store.root().display()))
        );
        return Ok(());
    }
    for db in &databases {
        let marker = if db.name == ctx.database { "*" } else { " " };
        let modified = db
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{} {:<24} {:>10}  {}",
            style(marker).green(),
            style(&db.name).cyan(),
            format_size(db.size_bytes),
            dim.apply_to(modified)
        );
    }
    Ok(())
}

fn cmd_select(name: &str, ctx: &Context) -> Result<()> {
    if !ctx.store().exists(name) {
        bail!("Database '{name}' not found");
    }

    let path = ctx.project_config_path();
    let mut config = if path.exists() {
        hyperrag_config::load_config_file(&path)?
    } else {
        HyperragConfig::new()
    };
    let mut storage = config.storage();
    storage.database = name.to_string();
    config.storage = Some(storage);
    hyperrag_config::save_config(&config, &path)?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "selected": name, "config": path }));
    } else {
        println!(
            "Selected {} {}",
            style(name).cyan(),
            Style::new()
                .dim()
                .apply_to(format!("(saved to {})", path.display()))
        );
    }
    Ok(())
}

fn cmd_stats(name: Option<&str>, ctx: &Context) -> Result<()> {
    let name = name.unwrap_or(&ctx.database);
    let Some(graph) = ctx.store().load(name)? else {
        bail!("Database '{name}' not found");
    };
    let stats = graph.stats();

    if ctx.json_output {
        let out = serde_json::json!({
            "name": name,
            "frozen_at": graph.frozen_at(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{} {}", style("Knowledge Base").bold(), style(name).cyan());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();
    println!("  Entities:        {}", style(stats.entities).cyan());
    println!("  Edges:           {}", style(stats.edges).cyan());
    println!("  Hyperedges:      {}", style(stats.hyperedges).cyan());
    println!("  Chunks:          {}", style(stats.chunks).cyan());
    println!("  Summarized:      {}", stats.summarized_lists);
    println!("  Type conflicts:  {}", stats.type_conflicts);
    println!(
        "  Frozen at:       {}",
        dim.apply_to(graph.frozen_at().format("%Y-%m-%d %H:%M:%S UTC"))
    );
    Ok(())
}

fn cmd_delete(name: &str, yes: bool, ctx: &Context) -> Result<()> {
    let store = ctx.store();
    if !store.exists(name) {
        bail!("Database '{name}' not found");
    }

    if !yes {
        eprint!("Delete knowledge base '{name}'? [y/N] ");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", Style::new().dim().apply_to("Aborted."));
            return Ok(());
        }
    }

    store.delete(name)?;
    if ctx.json_output {
        println!("{}", serde_json::json!({ "deleted": name }));
    } else {
        println!("Deleted {}", style(name).cyan());
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
