//! `revkb history` command
//!
//! Lists the revisions of an entity, oldest first.

use std::collections::HashMap;

use anyhow::{bail, Result};
use clap::Args;
use tabled::{Table, Tabled};

use super::utils::{open_storage, parse_gid};
use super::Context;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Gid of the entity
    pub gid: String,

    /// Show at most this many of the latest revisions (default: display.history_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Revision")]
    id: i64,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Edits")]
    edits: String,
    #[tabled(rename = "Master")]
    master: &'static str,
}

pub fn run(args: HistoryArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;

    let requested = parse_gid(&args.gid)?;
    let Some(gid) = storage.resolve_gid(requested)? else {
        bail!("Entity not found: {}", requested);
    };
    let Some(entity) = storage.get_entity(&gid)? else {
        bail!("Entity not found: {}", gid);
    };

    let mut revisions = storage.entity_history(&gid)?;
    let limit = args.limit.unwrap_or(ctx.config.display.history_limit);
    if revisions.len() > limit {
        revisions.drain(..revisions.len() - limit);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&revisions)?);
        return Ok(());
    }

    let mut users: HashMap<i64, String> = HashMap::new();
    let mut rows = Vec::with_capacity(revisions.len());
    for revision in &revisions {
        let user_id = revision.revision.user_id;
        if !users.contains_key(&user_id) {
            let name = storage
                .get_user(user_id)?
                .map(|u| u.name)
                .unwrap_or_else(|| format!("#{}", user_id));
            users.insert(user_id, name);
        }

        let edits = storage
            .edits_for_revision(revision.id())?
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        rows.push(HistoryRow {
            id: revision.id(),
            user: users[&user_id].clone(),
            created: revision
                .revision
                .created_at
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            edits,
            master: if entity.master_revision_id == Some(revision.id()) {
                "*"
            } else {
                ""
            },
        });
    }

    println!("📜 History of {}\n", gid);
    if rows.is_empty() {
        println!("  (no revisions)");
    } else {
        println!("{}", Table::new(rows));
    }

    Ok(())
}
