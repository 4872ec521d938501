//! Revisions - immutable snapshots created by edits
//!
//! Every revision has a base row (`revision`) carrying author, time and a
//! type discriminator, plus one row in the table of its type. Entity
//! revisions point at an entity and one of its trees.
//!
//! The factories that build revisions from submitted data live on
//! [`Storage`](super::storage::Storage) because they need the database:
//! `create_entity` and `update_entity`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Revision type discriminator (`revision.type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionType {
    Entity,
    Relationship,
}

impl RevisionType {
    pub fn code(self) -> i64 {
        match self {
            RevisionType::Entity => 1,
            RevisionType::Relationship => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(RevisionType::Entity),
            2 => Some(RevisionType::Relationship),
            _ => None,
        }
    }
}

/// Columns shared by all revisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub revision_type: RevisionType,
}

/// A revision of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRevision {
    #[serde(flatten)]
    pub revision: Revision,
    pub entity_gid: Ulid,
    pub entity_tree_id: i64,
}

impl EntityRevision {
    pub fn id(&self) -> i64 {
        self.revision.id
    }
}

/// A revision of a relationship between two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRevision {
    #[serde(flatten)]
    pub revision: Revision,
    pub relationship_id: i64,
    pub relationship_tree_id: i64,
}

impl RelationshipRevision {
    pub fn id(&self) -> i64 {
        self.revision.id
    }
}

/// Result of submitting an update for an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A new revision was stored
    Created(EntityRevision),
    /// Submitted data matches the master tree
    Unchanged,
    /// No entity with the submitted gid
    UnknownEntity,
    /// Entity exists but none of its revisions has been applied
    NoMasterRevision,
}

impl UpdateOutcome {
    pub fn revision(&self) -> Option<&EntityRevision> {
        match self {
            UpdateOutcome::Created(revision) => Some(revision),
            _ => None,
        }
    }

    pub fn into_revision(self) -> Option<EntityRevision> {
        match self {
            UpdateOutcome::Created(revision) => Some(revision),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EntityRevision {
        EntityRevision {
            revision: Revision {
                id: 4,
                user_id: 1,
                created_at: Utc::now(),
                revision_type: RevisionType::Entity,
            },
            entity_gid: Ulid::new(),
            entity_tree_id: 9,
        }
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(RevisionType::from_code(1), Some(RevisionType::Entity));
        assert_eq!(RevisionType::from_code(2), Some(RevisionType::Relationship));
        assert_eq!(RevisionType::from_code(0), None);
    }

    #[test]
    fn test_outcome_revision() {
        let revision = sample();
        let created = UpdateOutcome::Created(revision.clone());
        assert_eq!(created.revision().map(EntityRevision::id), Some(4));
        assert_eq!(created.into_revision(), Some(revision));
        assert!(UpdateOutcome::Unchanged.revision().is_none());
        assert!(UpdateOutcome::NoMasterRevision.into_revision().is_none());
    }

    #[test]
    fn test_serialize_flattens_base() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["id"], 4);
        assert_eq!(value["revision_type"], "entity");
        assert_eq!(value["entity_tree_id"], 9);
    }
}
