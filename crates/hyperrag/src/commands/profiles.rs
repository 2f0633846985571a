//! Profiles command - list and inspect domain profiles.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};

use hyperrag_config::TemplateKind;

use super::Context;

/// Arguments for the profiles command.
#[derive(Args, Debug)]
pub struct ProfilesArgs {
    #[command(subcommand)]
    pub command: ProfilesCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCommand {
    /// List built-in and configured profiles
    List,

    /// Show a resolved profile
    Show {
        /// Profile name
        name: String,

        /// Print one prompt template (e.g. entity_extraction, rag_response)
        #[arg(short, long)]
        template: Option<String>,
    },
}

/// Run the profiles command.
pub async fn run(args: ProfilesArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ProfilesCommand::List => cmd_list(ctx),
        ProfilesCommand::Show { name, template } => cmd_show(&name, template.as_deref(), ctx),
    }
}

fn cmd_list(ctx: &Context) -> Result<()> {
    let names = hyperrag_config::available_profiles(&ctx.config);
    let active = ctx.config.extraction().profile;

    if ctx.json_output {
        let out = serde_json::json!({ "profiles": names, "active": active });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", style("Domain Profiles").bold());
    println!("{}", Style::new().dim().apply_to("─".repeat(50)));
    println!();
    for name in &names {
        let marker = if *name == active { "*" } else { " " };
        println!("{} {}", style(marker).green(), style(name).cyan());
    }
    Ok(())
}

fn cmd_show(name: &str, template: Option<&str>, ctx: &Context) -> Result<()> {
    let profile = ctx.profile(Some(name))?;

    if let Some(template) = template {
        let Some(kind) = TemplateKind::from_name(template) else {
            let known: Vec<_> = TemplateKind::ALL.iter().map(TemplateKind::name).collect();
            bail!("Unknown template '{template}' (known: {})", known.join(", "));
        };
        println!("{}", profile.prompts.get(kind));
        return Ok(());
    }

    if ctx.json_output {
        let out = serde_json::json!({
            "name": profile.name,
            "domain": profile.domain,
            "entity_types": profile.entity_types,
            "language": profile.language,
            "max_gleaning": profile.max_gleaning,
            "delimiters": {
                "tuple": profile.delimiters.tuple,
                "record": profile.delimiters.record,
                "completion": profile.delimiters.completion,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{} {}", style("Profile").bold(), style(&profile.name).cyan());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();
    println!("  {}", profile.domain);
    println!();
    println!("  Entity types:  {}", profile.entity_types.join(", "));
    println!("  Language:      {}", profile.language);
    println!("  Gleaning cap:  {}", profile.max_gleaning);
    println!(
        "  Delimiters:    tuple {:?}, record {:?}, completion {:?}",
        profile.delimiters.tuple, profile.delimiters.record, profile.delimiters.completion
    );
    println!("  Examples:      {}", profile.examples.len());
    Ok(())
}
