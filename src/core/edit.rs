//! Users, edits and edit notes
//!
//! Users make edits; an edit groups the revisions submitted together and is
//! the unit that gets applied (its revisions become master) or cancelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Edit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditStatus {
    /// Accepting revisions
    #[default]
    Open,
    /// Revisions became master
    Applied,
    /// Dropped, revisions stay unused
    Cancelled,
}

impl EditStatus {
    pub fn code(self) -> i64 {
        match self {
            EditStatus::Open => 1,
            EditStatus::Applied => 2,
            EditStatus::Cancelled => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(EditStatus::Open),
            2 => Some(EditStatus::Applied),
            3 => Some(EditStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for EditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditStatus::Open => write!(f, "open"),
            EditStatus::Applied => write!(f, "applied"),
            EditStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for EditStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(EditStatus::Open),
            "applied" => Ok(EditStatus::Applied),
            "cancelled" | "canceled" => Ok(EditStatus::Cancelled),
            _ => anyhow::bail!("Unknown edit status: {}", s),
        }
    }
}

/// A user-initiated change grouping one or more revisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub id: i64,
    pub user_id: i64,
    pub status: EditStatus,
    pub created_at: DateTime<Utc>,
    /// Ids of the revisions in this edit, ascending
    #[serde(default)]
    pub revision_ids: Vec<i64>,
}

impl Edit {
    pub fn is_open(&self) -> bool {
        self.status == EditStatus::Open
    }
}

/// A discussion note on an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditNote {
    pub id: i64,
    pub user_id: i64,
    pub edit_id: i64,
    pub content: String,
    pub posted_at: DateTime<Utc>,
}
