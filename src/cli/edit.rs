//! `revkb edit` command
//!
//! Manage edits: open one to group several submissions, discuss it with
//! notes, then apply or cancel it.
//!
//! # Usage
//! ```bash
//! revkb edit open
//! revkb edit list --status open
//! revkb edit show 12
//! revkb edit note 12 "Source: publisher catalogue"
//! revkb edit apply 12
//! revkb edit cancel 12
//! ```

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{Table, Tabled};

use super::utils::{current_user, open_storage, short_gid};
use super::Context;
use crate::core::edit::{Edit, EditStatus};
use crate::core::storage::Storage;

#[derive(Args, Debug)]
pub struct EditArgs {
    #[command(subcommand)]
    pub command: EditCommands,
}

#[derive(Subcommand, Debug)]
pub enum EditCommands {
    /// Open a new edit
    Open,

    /// List edits, newest first
    List {
        /// Only edits with this status (open, applied, cancelled)
        #[arg(short, long)]
        status: Option<EditStatus>,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show an edit with its revisions and notes
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Post a note on an edit
    Note {
        id: i64,

        /// Note text
        content: String,
    },

    /// Apply an open edit
    Apply { id: i64 },

    /// Cancel an open edit
    Cancel { id: i64 },
}

#[derive(Tabled)]
struct EditRow {
    #[tabled(rename = "Edit")]
    id: i64,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Status")]
    status: EditStatus,
    #[tabled(rename = "Revisions")]
    revisions: usize,
    #[tabled(rename = "Created")]
    created: String,
}

pub fn execute(args: EditArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;

    match args.command {
        EditCommands::Open => {
            let user = current_user(&storage, ctx)?;
            let edit = storage.open_edit(user.id)?;
            println!("✅ Edit opened: {}", edit.id);
            println!("   Add revisions with --edit {}", edit.id);
        }
        EditCommands::List { status, limit } => list(&storage, status, limit)?,
        EditCommands::Show { id, json } => show(&storage, id, json)?,
        EditCommands::Note { id, content } => {
            let user = current_user(&storage, ctx)?;
            let note = storage.add_edit_note(id, user.id, &content)?;
            println!("💬 Note {} posted on edit {}", note.id, id);
        }
        EditCommands::Apply { id } => {
            let moved = storage.apply_edit(id)?;
            println!("✅ Edit {} applied ({} revision(s) now master)", id, moved);
        }
        EditCommands::Cancel { id } => {
            storage.cancel_edit(id)?;
            println!("🗑️  Edit {} cancelled", id);
        }
    }

    Ok(())
}

fn list(storage: &Storage, status: Option<EditStatus>, limit: usize) -> Result<()> {
    let edits = storage.list_edits(status, limit)?;
    if edits.is_empty() {
        println!("No edits");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(edits.len());
    for edit in edits {
        rows.push(EditRow {
            id: edit.id,
            user: user_name(storage, edit.user_id)?,
            status: edit.status,
            revisions: edit.revision_ids.len(),
            created: edit.created_at.format("%Y-%m-%d %H:%M").to_string(),
        });
    }
    println!("{}", Table::new(rows));
    Ok(())
}

fn show(storage: &Storage, id: i64, json: bool) -> Result<()> {
    let Some(edit) = storage.get_edit(id)? else {
        bail!("Edit not found: {}", id);
    };
    let notes = storage.edit_notes(id)?;

    if json {
        let json = serde_json::json!({
            "edit": edit,
            "notes": notes,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("\n✏️  Edit {} [{}]", edit.id, status_label(&edit));
    println!("   By:      {}", user_name(storage, edit.user_id)?);
    println!("   Created: {}", edit.created_at.format("%Y-%m-%d %H:%M:%S UTC"));

    println!("\nRevisions:");
    if edit.revision_ids.is_empty() {
        println!("  (none)");
    }
    for revision_id in &edit.revision_ids {
        match storage.get_entity_revision(*revision_id)? {
            Some(revision) => {
                let name = storage
                    .get_entity_tree(revision.entity_tree_id)?
                    .and_then(|t| t.display_name().map(str::to_string))
                    .unwrap_or_else(|| "(unnamed)".to_string());
                println!(
                    "  {}  entity {} {}",
                    revision_id,
                    short_gid(&revision.entity_gid),
                    name
                );
            }
            None => println!("  {}  relationship", revision_id),
        }
    }

    if !notes.is_empty() {
        println!("\nNotes:");
        for note in &notes {
            println!(
                "  {} {}: {}",
                note.posted_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                user_name(storage, note.user_id)?.bold(),
                note.content
            );
        }
    }

    Ok(())
}

fn status_label(edit: &Edit) -> colored::ColoredString {
    match edit.status {
        EditStatus::Open => "open".yellow(),
        EditStatus::Applied => "applied".green(),
        EditStatus::Cancelled => "cancelled".red(),
    }
}

fn user_name(storage: &Storage, user_id: i64) -> Result<String> {
    Ok(storage
        .get_user(user_id)?
        .map(|u| u.name)
        .unwrap_or_else(|| format!("#{}", user_id)))
}
