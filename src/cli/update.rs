//! `revkb update` command
//!
//! Submits changes to an entity. Only the given fields change; the new
//! revision is stored only if the result differs from the current state.
//!
//! # Usage
//! ```bash
//! revkb update 01HQ3K2JN5... -d "novel"
//! revkb update 01HQ3K2JN5... -a "Dune" -a "Duna|Duna|7" --apply
//! ```

use anyhow::{anyhow, Result};
use clap::Args;

use super::submission::{EditOptions, RevisionArgs};
use super::utils::{current_user, open_storage, parse_gid};
use super::Context;
use crate::core::revision::UpdateOutcome;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Gid of the entity
    pub gid: String,

    #[command(flatten)]
    pub revision: RevisionArgs,

    #[command(flatten)]
    pub edit: EditOptions,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: UpdateArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;
    let user = current_user(&storage, ctx)?;

    let gid = parse_gid(&args.gid)?;
    let mut data = args.revision.to_data()?;
    data.gid = Some(gid);

    let edit = args.edit.edit(&storage, &user)?;
    let outcome = match storage.update_entity(user.id, edit.id, &data) {
        Ok(outcome) => outcome,
        Err(err) => return Err(args.edit.abandon(&storage, &edit, err)),
    };

    let revision = match outcome {
        UpdateOutcome::Created(revision) => revision,
        UpdateOutcome::Unchanged => {
            args.edit.discard(&storage, &edit)?;
            if args.json {
                println!("{}", serde_json::json!({ "gid": gid.to_string(), "changed": false }));
            } else {
                println!("Nothing to change: {} already has this data", gid);
            }
            return Ok(());
        }
        UpdateOutcome::UnknownEntity => {
            let err = anyhow!("Entity not found: {}", gid);
            return Err(args.edit.abandon(&storage, &edit, err));
        }
        UpdateOutcome::NoMasterRevision => {
            let err = anyhow!(
                "Entity {} has no accepted revision yet. Apply its first edit before updating.",
                gid
            );
            return Err(args.edit.abandon(&storage, &edit, err));
        }
    };
    let applied = args.edit.finish(&storage, ctx, &user, &edit)?;

    if args.json {
        let json = serde_json::json!({
            "gid": revision.entity_gid.to_string(),
            "changed": true,
            "revision_id": revision.id(),
            "edit_id": edit.id,
            "applied": applied,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("✅ Revision {} submitted for {}", revision.id(), revision.entity_gid);
        println!(
            "   Edit: {} ({})",
            edit.id,
            if applied { "applied" } else { "open" }
        );
    }

    Ok(())
}
