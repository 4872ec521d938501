//! `revkb search` command
//!
//! Searches the aliases of accepted entities.
//!
//! # Usage
//! ```bash
//! revkb search "dune"
//! revkb search "herbert frank" --limit 5 --json
//! ```
//!
//! Uses FTS5 with BM25 ranking; any word may match.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::open_storage;
use super::Context;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Maximum results (default: display.search_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;
    let limit = args.limit.unwrap_or(ctx.config.display.search_limit);
    let hits = storage.search(&args.query, limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No entities match '{}'", args.query);
        return Ok(());
    }

    println!("🔍 {} result(s) for '{}'\n", hits.len(), args.query);
    for hit in &hits {
        let name = hit.name.as_deref().unwrap_or("(unnamed)");
        print!("  {} {} {}", hit.gid.to_string().dimmed(), name.bold(), format!("[{}]", hit.kind).cyan());
        match &hit.disambiguation {
            Some(comment) => println!(" ({})", comment),
            None => println!(),
        }
    }

    Ok(())
}
