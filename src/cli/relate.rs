//! `revkb relate` command
//!
//! Creates a relationship between two entities.
//!
//! # Usage
//! ```bash
//! revkb relate <CREATOR_GID> authored <WORK_GID> --apply
//! revkb relate <WORK_GID> translated <WORK_GID> --edit 12 --json
//! ```

use anyhow::Result;
use clap::Args;

use super::submission::EditOptions;
use super::utils::{current_user, open_storage, parse_gid};
use super::Context;
use crate::core::relationship::RelationshipData;

#[derive(Args, Debug)]
pub struct RelateArgs {
    /// Gid of the source entity
    pub source: String,

    /// Relationship type (e.g. authored, translated, published)
    pub relationship_type: String,

    /// Gid of the target entity
    pub target: String,

    #[command(flatten)]
    pub edit: EditOptions,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RelateArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;
    let user = current_user(&storage, ctx)?;

    let data = RelationshipData::new(
        parse_gid(&args.source)?,
        args.relationship_type.clone(),
        parse_gid(&args.target)?,
    );

    let edit = args.edit.edit(&storage, &user)?;
    let revision = match storage.create_relationship(user.id, edit.id, &data) {
        Ok(revision) => revision,
        Err(err) => return Err(args.edit.abandon(&storage, &edit, err)),
    };
    let applied = args.edit.finish(&storage, ctx, &user, &edit)?;

    if args.json {
        let json = serde_json::json!({
            "relationship_id": revision.relationship_id,
            "revision_id": revision.id(),
            "edit_id": edit.id,
            "applied": applied,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("✅ Relationship created: {}", revision.relationship_id);
        println!("   Revision: {}", revision.id());
        println!(
            "   Edit:     {} ({})",
            edit.id,
            if applied { "applied" } else { "open" }
        );
    }

    Ok(())
}
