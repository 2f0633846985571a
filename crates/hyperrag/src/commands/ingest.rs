//! Ingest command - build or extend a knowledge base from documents.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use hyperrag_engine::{Chunk, IngestOptions, IngestReport, Ingestor};
use hyperrag_graph::SnapshotCell;

use super::Context;

/// Arguments for the ingest command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Input files: `.jsonl` with one `{"id", "text"}` chunk per line, anything else as plain text
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Domain profile (default: [extraction] profile)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Start from an empty graph instead of extending the database
    #[arg(long)]
    pub fresh: bool,

    /// Target chunk size in characters for plain-text input
    #[arg(long, default_value = "1200")]
    pub chunk_chars: usize,
}

/// Run the ingest command.
pub async fn run(args: IngestArgs, ctx: &Context) -> Result<()> {
    let dim = Style::new().dim();
    let profile = ctx.profile(args.profile.as_deref())?;

    let mut chunks = Vec::new();
    for path in &args.inputs {
        chunks.extend(load_chunks(path, args.chunk_chars)?);
    }
    if chunks.is_empty() {
        bail!("No text found in the given inputs");
    }
    ensure_unique_ids(&chunks)?;

    let store = ctx.store();
    let cell = match store.load(&ctx.database)? {
        Some(existing) if !args.fresh => {
            if ctx.verbose {
                println!(
                    "{}",
                    dim.apply_to(format!("Extending '{}': {}", ctx.database, existing.stats()))
                );
            }
            Arc::new(SnapshotCell::new(existing))
        }
        _ => Arc::new(SnapshotCell::default()),
    };

    let ingestor = Ingestor::new(
        ctx.completer()?,
        profile,
        IngestOptions::from_config(&ctx.config),
    )
    .with_snapshot(cell.clone());

    let pb = if ctx.json_output {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(chunks.len() as u64)
    };
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] {pos}/{len} chunks {msg}",
    )?);
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = ingestor
        .ingest_with_progress(chunks, |progress| {
            pb.set_position(progress.completed as u64);
            pb.set_message(progress.chunk_id.clone());
        })
        .await;
    pb.finish_and_clear();
    let report = result?;

    let path = store.save(&ctx.database, &cell.current())?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &ctx.database, &path);
    }
    Ok(())
}

fn print_report(report: &IngestReport, database: &str, path: &Path) {
    let dim = Style::new().dim();
    let yellow = Style::new().yellow();

    println!("{}", style("Ingestion Complete").bold().green());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();
    println!(
        "  Chunks:      {} / {}",
        style(report.chunks_processed).cyan(),
        report.chunks_total()
    );
    println!(
        "  Records:     {} {}",
        style(report.records_parsed).cyan(),
        dim.apply_to(format!("({} lines skipped)", report.lines_skipped))
    );
    println!(
        "  Entities:    {} new, {} merged",
        style(report.entities_created).cyan(),
        report.entities_merged
    );
    println!(
        "  Edges:       {} new, {} merged",
        style(report.edges_created).cyan(),
        report.edges_merged
    );
    println!(
        "  Hyperedges:  {} new, {} merged",
        style(report.hyperedges_created).cyan(),
        report.hyperedges_merged
    );
    println!("  Summaries:   {}", report.summaries_applied);
    println!("  Completions: {}", report.completion_calls);
    if report.has_losses() {
        println!(
            "  Losses:      {}",
            yellow.apply_to(format!(
                "{} chunks failed, {} dangling dropped, {} summaries failed, {} completions failed",
                report.chunks_failed,
                report.dangling_dropped,
                report.summaries_failed,
                report.completion_failures
            ))
        );
    }
    if report.type_conflicts > 0 {
        println!(
            "  Type votes:  {}",
            yellow.apply_to(format!("{} conflicting", report.type_conflicts))
        );
    }
    println!();
    println!(
        "  Saved '{}' to {}",
        style(database).cyan(),
        dim.apply_to(path.display())
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Loading
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChunkLine {
    id: String,
    text: String,
}

fn load_chunks(path: &Path, chunk_chars: usize) -> Result<Vec<Chunk>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("jsonl")) {
        parse_jsonl(&contents).with_context(|| format!("Invalid chunk file {}", path.display()))
    } else {
        // The full path keeps same-named files in different directories apart,
        // in this run and in later runs extending the same database.
        let source = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        Ok(chunk_text(&source.to_string_lossy(), &contents, chunk_chars))
    }
}

fn parse_jsonl(contents: &str) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut seen = HashSet::new();
    for (i, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ChunkLine =
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))?;
        if !seen.insert(parsed.id.clone()) {
            bail!("line {}: duplicate chunk id '{}'", i + 1, parsed.id);
        }
        if !parsed.text.trim().is_empty() {
            chunks.push(Chunk::new(parsed.id, parsed.text));
        }
    }
    Ok(chunks)
}

/// Chunk ids key every vote and source reference in the graph.
fn ensure_unique_ids(chunks: &[Chunk]) -> Result<()> {
    let mut seen = HashSet::with_capacity(chunks.len());
    match chunks.iter().find(|c| !seen.insert(c.id.as_str())) {
        Some(dup) => bail!("Duplicate chunk id '{}' across inputs", dup.id),
        None => Ok(()),
    }
}

/// Pack blank-line-separated paragraphs into chunks of about `chunk_chars`.
///
/// Ids are `<source>#<index>` zero-padded, so they sort in document order.
fn chunk_text(source: &str, text: &str, chunk_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String| {
        if !current.is_empty() {
            let id = format!("{source}#{:05}", chunks.len());
            chunks.push(Chunk::new(id, std::mem::take(current)));
        }
    };

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > chunk_chars {
            flush(&mut current);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    flush(&mut current);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_packs_paragraphs() {
        let text = "First paragraph.\n\nSecond one.\n\n\n\nThird paragraph here.";
        let chunks = chunk_text("guide", text, 30);
        let ids: Vec<_> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["guide#00000", "guide#00001"]);
        assert_eq!(chunks[0].text, "First paragraph.\n\nSecond one.");
        assert_eq!(chunks[1].text, "Third paragraph here.");
    }

    #[test]
    fn test_chunk_text_keeps_oversized_paragraph_whole() {
        let chunks = chunk_text("doc", &"x".repeat(50), 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.len(), 50);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("doc", "\n\n  \n", 100).is_empty());
    }

    #[test]
    fn test_parse_jsonl() {
        let contents = "{\"id\": \"a#1\", \"text\": \"Alpha\"}\n\n{\"id\": \"a#2\", \"text\": \"  \"}\n";
        let chunks = parse_jsonl(contents).unwrap();
        assert_eq!(chunks, vec![Chunk::new("a#1", "Alpha")]);
    }

    #[test]
    fn test_parse_jsonl_rejects_repeated_id() {
        let contents = "{\"id\": \"a#1\", \"text\": \"Alpha\"}\n{\"id\": \"a#1\", \"text\": \"Beta\"}\n";
        let err = parse_jsonl(contents).unwrap_err();
        assert!(err.to_string().contains("line 2: duplicate chunk id 'a#1'"));
    }

    #[test]
    fn test_same_file_name_in_two_directories_gets_distinct_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ids = Vec::new();
        for sub in ["a", "b"] {
            let folder = dir.path().join(sub);
            std::fs::create_dir(&folder).unwrap();
            let file = folder.join("guide.txt");
            std::fs::write(&file, "Edit Web.config.").unwrap();
            ids.extend(load_chunks(&file, 1200).unwrap().into_iter().map(|c| c.id));
        }
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert!(ids[0].ends_with("guide.txt#00000"));
    }

    #[test]
    fn test_ids_repeated_across_inputs_are_rejected() {
        let chunks = vec![Chunk::new("x#1", "one"), Chunk::new("x#1", "two")];
        let err = ensure_unique_ids(&chunks).unwrap_err();
        assert!(err.to_string().contains("Duplicate chunk id 'x#1'"));
        assert!(ensure_unique_ids(&chunks[..1]).is_ok());
    }

    #[test]
    fn test_parse_jsonl_reports_line() {
        let err = parse_jsonl("{\"id\": \"a\", \"text\": \"ok\"}\nnot json").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
