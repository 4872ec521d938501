//! Entity - versioned resource records
//!
//! An entity is only an identity: a stable `gid` plus a pointer to the
//! revision currently accepted as its state. All content lives in the
//! immutable trees that revisions point to.
//!
//! # Key Properties
//! - **gid**: ULID, never reused, survives merges through redirects
//! - **master_revision_id**: `None` until an edit with its first revision is applied
//! - **kind**: fixed by the first revision, stored on the tree's data row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Entity kind, stored as the integer discriminator of `entity_data.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Creator,
    Publication,
    Edition,
    Work,
    Publisher,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Creator,
        EntityKind::Publication,
        EntityKind::Edition,
        EntityKind::Work,
        EntityKind::Publisher,
    ];

    /// Discriminator stored in the database
    pub fn code(self) -> i64 {
        match self {
            EntityKind::Creator => 1,
            EntityKind::Publication => 2,
            EntityKind::Edition => 3,
            EntityKind::Work => 4,
            EntityKind::Publisher => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Creator => write!(f, "creator"),
            EntityKind::Publication => write!(f, "publication"),
            EntityKind::Edition => write!(f, "edition"),
            EntityKind::Work => write!(f, "work"),
            EntityKind::Publisher => write!(f, "publisher"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creator" => Ok(EntityKind::Creator),
            "publication" => Ok(EntityKind::Publication),
            "edition" => Ok(EntityKind::Edition),
            "work" => Ok(EntityKind::Work),
            "publisher" => Ok(EntityKind::Publisher),
            _ => anyhow::bail!("Unknown entity kind: {}", s),
        }
    }
}

/// A versioned resource record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier
    pub gid: Ulid,

    /// Set on creation and whenever the master pointer moves
    pub last_updated: DateTime<Utc>,

    /// Currently accepted revision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_revision_id: Option<i64>,
}

impl Entity {
    /// A fresh entity with no accepted revision
    pub fn new() -> Self {
        Self {
            gid: Ulid::new(),
            last_updated: Utc::now(),
            master_revision_id: None,
        }
    }

    pub fn has_master(&self) -> bool {
        self.master_revision_id.is_some()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

/// Points a merged-away gid at the entity that replaced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRedirect {
    pub source_gid: Ulid,
    pub target_gid: Ulid,
}

/// Typed data of one tree
///
/// Kind-specific fields are kept as a JSON object rather than one table per
/// kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    pub id: i64,
    pub kind: EntityKind,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}
