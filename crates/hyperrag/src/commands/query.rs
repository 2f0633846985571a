//! Query command - answer a question from a knowledge base.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use hyperrag_engine::{AnswerOptions, Answerer};
use hyperrag_graph::{FAIL_RESPONSE, QueryKeywords, Retrieval, SnapshotCell};

use super::Context;

/// Arguments for the query command.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// The question to answer
    pub query: String,

    /// Domain profile (default: [extraction] profile)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Print the retrieved context instead of generating an answer
    #[arg(long)]
    pub context_only: bool,

    /// Response format hint, e.g. "Single Paragraph" or "Bullet Points"
    #[arg(long)]
    pub response_type: Option<String>,
}

/// Run the query command.
pub async fn run(args: QueryArgs, ctx: &Context) -> Result<()> {
    let snapshot = Arc::new(SnapshotCell::new(ctx.load_database()?));
    let profile = Arc::new(ctx.profile(args.profile.as_deref())?);

    let mut options = AnswerOptions::from_config(&ctx.config);
    if let Some(response_type) = args.response_type {
        options.response_type = response_type;
    }
    let answerer = Answerer::new(ctx.completer()?, profile, snapshot, options);

    if args.context_only {
        let (keywords, retrieval) = answerer.retrieve(&args.query).await;
        let context = match &retrieval {
            Retrieval::Context(package) => Some(package.render()),
            Retrieval::NoRelevantData => None,
        };
        if ctx.json_output {
            let out = serde_json::json!({
                "keywords": keywords,
                "context": context,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            print_keywords(&keywords, ctx.verbose);
            println!("{}", context.as_deref().unwrap_or(FAIL_RESPONSE));
        }
        return Ok(());
    }

    let answer = answerer.answer(&args.query).await?;
    if ctx.json_output {
        let out = serde_json::json!({
            "answer": answer.text,
            "keywords": answer.keywords,
            "matched": !answer.is_fail_response(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_keywords(&answer.keywords, ctx.verbose);
        if answer.is_fail_response() {
            println!("{}", Style::new().yellow().apply_to(&answer.text));
        } else {
            println!("{}", answer.text);
        }
    }
    Ok(())
}

fn print_keywords(keywords: &QueryKeywords, verbose: bool) {
    if !verbose {
        return;
    }
    let dim = Style::new().dim();
    println!(
        "{} {}",
        style("Themes:").bold(),
        dim.apply_to(keywords.high_level_keywords.join(", "))
    );
    println!(
        "{} {}",
        style("Terms:").bold(),
        dim.apply_to(keywords.low_level_keywords.join(", "))
    );
    println!();
}
