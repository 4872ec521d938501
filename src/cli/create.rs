//! `revkb create` command
//!
//! Creates a new entity and its first revision.
//!
//! # Usage
//! ```bash
//! revkb create --kind work -a "Dune" --annotation "First published 1965"
//! revkb create --kind creator -a "Frank Herbert|Herbert, Frank" --apply
//! revkb create -f dune.json --edit 12
//! ```

use anyhow::Result;
use clap::Args;

use super::submission::{EditOptions, RevisionArgs};
use super::utils::{current_user, open_storage};
use super::Context;

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub revision: RevisionArgs,

    #[command(flatten)]
    pub edit: EditOptions,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CreateArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;
    let user = current_user(&storage, ctx)?;

    let mut data = args.revision.to_data()?;
    if data.kind.is_none() {
        data.kind = ctx.config.core.default_kind;
    }

    let edit = args.edit.edit(&storage, &user)?;
    let revision = match storage.create_entity(user.id, edit.id, &data) {
        Ok(revision) => revision,
        Err(err) => return Err(args.edit.abandon(&storage, &edit, err)),
    };
    let applied = args.edit.finish(&storage, ctx, &user, &edit)?;

    if args.json {
        let json = serde_json::json!({
            "gid": revision.entity_gid.to_string(),
            "revision_id": revision.id(),
            "edit_id": edit.id,
            "applied": applied,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("✅ Entity created: {}", revision.entity_gid);
        println!("   Revision: {}", revision.id());
        println!(
            "   Edit:     {} ({})",
            edit.id,
            if applied { "applied" } else { "open" }
        );
    }

    Ok(())
}
