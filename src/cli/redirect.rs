//! `revkb redirect` command
//!
//! Points a duplicate entity at the one that replaces it. Lookups of the
//! old gid land on the target from then on.

use anyhow::Result;
use clap::Args;

use super::utils::{open_storage, parse_gid};
use super::Context;

#[derive(Args, Debug)]
pub struct RedirectArgs {
    /// Gid to redirect
    pub source: String,

    /// Gid it should resolve to
    pub target: String,
}

pub fn run(args: RedirectArgs, ctx: &Context) -> Result<()> {
    let storage = open_storage(ctx)?;

    let source = parse_gid(&args.source)?;
    let target = parse_gid(&args.target)?;
    let redirect = storage.redirect(source, target)?;
    println!(
        "✅ Redirected {} → {}",
        redirect.source_gid, redirect.target_gid
    );

    Ok(())
}
