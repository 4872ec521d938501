//! revkb - collaborative, versioned knowledge base
//!
//! Every change to an entity is recorded as a revision. Revisions are
//! grouped into edits; applying an edit makes its revisions current.
//!
//! ## Key Concepts
//!
//! - **Entity**: identified by a ULID gid, points at its master revision
//! - **Entity tree**: immutable snapshot of everything known about an entity
//!   (aliases, annotation, disambiguation, kind-specific data)
//! - **Insert-only**: trees and revisions are never updated; unchanged parts
//!   are shared between trees
//! - **Edits**: open → applied | cancelled; only applying an edit moves
//!   master pointers
//! - **Redirects**: merged duplicates resolve to the surviving entity

pub mod cli;
pub mod config;
pub mod core;

pub use core::entity::{Entity, EntityKind};
pub use core::error::StoreError;
pub use core::revision::{EntityRevision, UpdateOutcome};
pub use core::storage::Storage;
pub use core::tree::{AliasDraft, EntityTree, RevisionData};
