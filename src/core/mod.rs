//! Core module - Business logic
//!
//! Entities, the trees that describe them, revisions and edits, and the
//! SQLite storage that ties them together.

pub mod edit;
pub mod entity;
pub mod error;
pub mod relationship;
pub mod revision;
pub(crate) mod schema;
pub mod storage;
pub mod tree;
