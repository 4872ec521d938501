//! CLI utility functions
//!
//! Helpers shared across commands:
//! - Opening the repository database
//! - Resolving the acting user
//! - Parsing gids from arguments

use anyhow::{bail, Context as _, Result};
use ulid::Ulid;

use super::Context;
use crate::core::edit::User;
use crate::core::storage::Storage;

/// Open the database of the current repository
///
/// # Errors
/// Returns an error if the database does not exist yet.
pub fn open_storage(ctx: &Context) -> Result<Storage> {
    let db_path = ctx.config.data_path();
    if !db_path.exists() {
        bail!(
            "No database at {}. Run 'revkb init' first.",
            db_path.display()
        );
    }
    Storage::open(&db_path)
}

/// The acting user, created on first use
pub fn current_user(storage: &Storage, ctx: &Context) -> Result<User> {
    storage
        .get_or_create_user(ctx.user_name())
        .with_context(|| format!("Failed to resolve user '{}'", ctx.user_name()))
}

/// Parse an entity gid
pub fn parse_gid(s: &str) -> Result<Ulid> {
    Ulid::from_string(s.trim()).map_err(|_| anyhow::anyhow!("Invalid gid: {}", s))
}

/// Short form of a gid for tables
pub fn short_gid(gid: &Ulid) -> String {
    gid.to_string()[..10].to_string()
}
