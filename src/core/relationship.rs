//! Relationships between entities
//!
//! Versioned the same way entities are: a `rel` row with a master pointer,
//! and immutable trees referenced by relationship revisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_revision_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTree {
    pub id: i64,
    pub relationship_type: String,
    pub source_gid: Ulid,
    pub target_gid: Ulid,
}

/// Data submitted for a new relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipData {
    pub relationship_type: String,
    pub source_gid: Ulid,
    pub target_gid: Ulid,
}

impl RelationshipData {
    pub fn new(source_gid: Ulid, relationship_type: impl Into<String>, target_gid: Ulid) -> Self {
        Self {
            relationship_type: relationship_type.into(),
            source_gid,
            target_gid,
        }
    }

    /// Trimmed copy, or an error when the type is empty or both ends match
    pub fn validated(&self) -> Result<Self, StoreError> {
        let relationship_type = self.relationship_type.trim();
        if relationship_type.is_empty() {
            return Err(StoreError::InvalidInput(
                "relationship type is empty".to_string(),
            ));
        }
        if self.source_gid == self.target_gid {
            return Err(StoreError::InvalidInput(format!(
                "entity {} cannot be related to itself",
                self.source_gid
            )));
        }
        Ok(Self {
            relationship_type: relationship_type.to_string(),
            ..self.clone()
        })
    }
}
