//! Store error types
//!
//! Rule violations raised by the storage layer. Callers receive them wrapped
//! in `anyhow::Error` and can `downcast_ref::<StoreError>()` when they need
//! to tell them apart from SQLite failures.

use thiserror::Error;
use ulid::Ulid;

use super::edit::EditStatus;
use super::entity::EntityKind;

/// Errors from knowledge base operations.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// No user with this id.
    #[error("Unknown user: {0}")]
    UnknownUser(i64),

    /// No edit with this id.
    #[error("Unknown edit: {0}")]
    UnknownEdit(i64),

    /// Edit is no longer open for changes.
    #[error("Edit {id} is {status}, not open")]
    EditNotOpen { id: i64, status: EditStatus },

    /// Revisions can only be added to an edit by its author.
    #[error("Edit {edit_id} does not belong to user {user_id}")]
    EditNotOwned { edit_id: i64, user_id: i64 },

    /// No entity with this gid (after following redirects).
    #[error("Unknown entity: {0}")]
    UnknownEntity(Ulid),

    /// A required field was not submitted.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Submitted data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An update tried to change the kind of an entity.
    #[error("Entity is a {expected}, cannot submit {found} data")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    /// Redirect would make a lookup loop forever.
    #[error("Redirecting {source_gid} to {target_gid} would create a cycle")]
    RedirectCycle { source_gid: Ulid, target_gid: Ulid },
}
