//! `revkb show` command
//!
//! Shows the current state of an entity, or the state at a given revision.
//!
//! # Usage
//! ```bash
//! revkb show 01HQ3K2JN5...
//! revkb show 01HQ3K2JN5... --revision 14
//! revkb show 01HQ3K2JN5... --json
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use tabled::{Table, Tabled};

use super::utils::{open_storage, parse_gid, short_gid};
use super::Context;
use crate::core::entity::Entity;
use crate::core::relationship::RelationshipTree;
use crate::core::storage::Storage;
use crate::core::tree::EntityTree;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Gid of the entity
    pub gid: String,

    /// Show the tree of this revision instead of the master
    #[arg(short, long)]
    pub revision: Option<i64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct AliasRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Sort name")]
    sort_name: String,
    #[tabled(rename = "Language")]
    language: String,
}

pub fn run(args: ShowArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;

    let requested = parse_gid(&args.gid)?;
    let Some(gid) = storage.resolve_gid(requested)? else {
        bail!("Entity not found: {}", requested);
    };
    let Some(entity) = storage.get_entity(&gid)? else {
        bail!("Entity not found: {}", gid);
    };

    let tree = match args.revision {
        Some(revision_id) => {
            let Some(revision) = storage.get_entity_revision(revision_id)? else {
                bail!("Revision not found: {}", revision_id);
            };
            if revision.entity_gid != gid {
                bail!("Revision {} belongs to {}, not {}", revision_id, revision.entity_gid, gid);
            }
            storage.get_entity_tree(revision.entity_tree_id)?
        }
        None => storage.master_tree(gid)?,
    };
    let relationships = storage.relationships_of(&gid)?;

    if args.json {
        let json = serde_json::json!({
            "entity": entity,
            "redirected_from": (requested != gid).then(|| requested.to_string()),
            "tree": tree,
            "relationships": relationships,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if requested != gid {
        println!("{} {} → {}", "↪".yellow(), requested, gid);
    }

    match tree {
        Some(tree) => print_tree(&storage, &entity, &tree, &relationships, args.revision)?,
        None if !entity.has_master() => {
            println!("📄 {}", entity.gid);
            println!("   {}", "No accepted revision yet".yellow());
            let pending = storage.entity_history(&gid)?;
            println!(
                "   {} pending revision(s); apply their edit to accept them",
                pending.len()
            );
        }
        None => bail!("Entity {} has no tree", gid),
    }

    Ok(())
}

fn print_tree(
    storage: &Storage,
    entity: &Entity,
    tree: &EntityTree,
    relationships: &[RelationshipTree],
    revision: Option<i64>,
) -> Result<()> {
    let name = tree.display_name().unwrap_or("(unnamed)");
    println!("\n📄 {} {}", name.bold(), format!("[{}]", tree.data.kind).dimmed());
    if let Some(disambiguation) = &tree.disambiguation {
        println!("   ({})", disambiguation.comment);
    }
    println!("{}", "─".repeat(41));
    println!("Gid:      {}", entity.gid);
    match revision {
        Some(id) => println!("Revision: {} (requested)", id),
        None => {
            if let Some(id) = entity.master_revision_id {
                println!("Revision: {} (master)", id);
            }
        }
    }
    println!("Updated:  {}", entity.last_updated.format("%Y-%m-%d %H:%M:%S UTC"));

    if !tree.aliases.is_empty() {
        let rows: Vec<AliasRow> = tree
            .aliases
            .iter()
            .map(|a| AliasRow {
                name: a.name.clone(),
                sort_name: a.sort_name.clone(),
                language: a.language_id.map(|l| l.to_string()).unwrap_or_default(),
            })
            .collect();
        println!("\nAliases:\n{}", Table::new(rows));
    }

    if !tree.data.attributes.is_empty() {
        println!("\nAttributes:");
        for (key, value) in &tree.data.attributes {
            println!("  {}: {}", key, value);
        }
    }

    if let Some(annotation) = &tree.annotation {
        println!("\nAnnotation:\n{}", annotation.content);
    }

    if !relationships.is_empty() {
        println!("\nRelationships:");
        for rel in relationships {
            let (arrow, other) = if rel.source_gid == entity.gid {
                ("→", rel.target_gid)
            } else {
                ("←", rel.source_gid)
            };
            let other_name = storage
                .master_tree(other)?
                .and_then(|t| t.display_name().map(str::to_string))
                .unwrap_or_else(|| short_gid(&other));
            println!("  {} {} {} ({})", rel.relationship_type, arrow, other_name, short_gid(&other));
        }
    }

    Ok(())
}
