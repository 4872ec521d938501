//! Entity trees - the data bundled with one revision
//!
//! A stored [`EntityTree`] is immutable. New revisions are built as a
//! [`TreeDraft`], either from submitted [`RevisionData`] alone (create) or by
//! applying the submission on top of the current master tree (update). Two
//! drafts compare equal when they describe the same content, which is how an
//! update detects that nothing changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::entity::{EntityData, EntityKind};
use super::error::StoreError;

/// Free-text note attached to a tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Short comment telling apart entities with the same name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disambiguation {
    pub id: i64,
    pub comment: String,
}

/// An alias, or alternative name, for an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub id: i64,
    pub name: String,
    pub sort_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_id: Option<i64>,
}

impl Alias {
    pub fn draft(&self) -> AliasDraft {
        AliasDraft {
            name: self.name.clone(),
            sort_name: self.sort_name.clone(),
            language_id: self.language_id,
        }
    }
}

/// A stored tree with its parts loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTree {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<Disambiguation>,
    pub data: EntityData,
    #[serde(default)]
    pub aliases: Vec<Alias>,
}

impl EntityTree {
    /// The content of this tree, without row ids
    pub fn draft(&self) -> TreeDraft {
        let mut aliases: Vec<AliasDraft> = self.aliases.iter().map(Alias::draft).collect();
        aliases.sort();
        aliases.dedup();

        TreeDraft {
            kind: self.data.kind,
            annotation: self.annotation.as_ref().map(|a| a.content.clone()),
            disambiguation: self.disambiguation.as_ref().map(|d| d.comment.clone()),
            attributes: self.data.attributes.clone(),
            aliases,
        }
    }

    /// Name used for display: first alias in sort order
    pub fn display_name(&self) -> Option<&str> {
        self.aliases
            .iter()
            .min_by(|a, b| a.sort_name.cmp(&b.sort_name).then(a.name.cmp(&b.name)))
            .map(|a| a.name.as_str())
    }
}

/// Alias content as submitted
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AliasDraft {
    pub name: String,
    /// Defaults to `name` when empty
    #[serde(default)]
    pub sort_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_id: Option<i64>,
}

impl AliasDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_name: String::new(),
            language_id: None,
        }
    }

    pub fn with_sort_name(mut self, sort_name: impl Into<String>) -> Self {
        self.sort_name = sort_name.into();
        self
    }

    pub fn with_language(mut self, language_id: i64) -> Self {
        self.language_id = Some(language_id);
        self
    }

    fn normalized(&self) -> Result<Self, StoreError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("alias name is empty".to_string()));
        }
        let sort_name = match self.sort_name.trim() {
            "" => name,
            s => s,
        };
        Ok(Self {
            name: name.to_string(),
            sort_name: sort_name.to_string(),
            language_id: self.language_id,
        })
    }
}

/// Data submitted for a new revision
///
/// Every field is optional. On create, `kind` is required and absent fields
/// are empty. On update, absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<Ulid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<AliasDraft>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Normalized, unsaved tree content
#[derive(Debug, Clone, PartialEq)]
pub struct TreeDraft {
    pub kind: EntityKind,
    pub annotation: Option<String>,
    pub disambiguation: Option<String>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Sorted and de-duplicated
    pub aliases: Vec<AliasDraft>,
}

impl TreeDraft {
    /// Build the tree of a brand new entity
    pub fn from_data(data: &RevisionData) -> Result<Self, StoreError> {
        let kind = data.kind.ok_or(StoreError::MissingField("kind"))?;

        Ok(Self {
            kind,
            annotation: normalize_text(data.annotation.as_deref()),
            disambiguation: normalize_text(data.disambiguation.as_deref()),
            attributes: data.attributes.clone().unwrap_or_default(),
            aliases: normalize_aliases(data.aliases.as_deref().unwrap_or_default())?,
        })
    }

    /// Apply a submission on top of this tree
    pub fn apply(&self, data: &RevisionData) -> Result<Self, StoreError> {
        if let Some(kind) = data.kind {
            if kind != self.kind {
                return Err(StoreError::KindMismatch {
                    expected: self.kind,
                    found: kind,
                });
            }
        }

        let mut next = self.clone();
        if let Some(annotation) = &data.annotation {
            next.annotation = normalize_text(Some(annotation));
        }
        if let Some(disambiguation) = &data.disambiguation {
            next.disambiguation = normalize_text(Some(disambiguation));
        }
        if let Some(attributes) = &data.attributes {
            next.attributes = attributes.clone();
        }
        if let Some(aliases) = &data.aliases {
            next.aliases = normalize_aliases(aliases)?;
        }
        Ok(next)
    }
}

fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn normalize_aliases(aliases: &[AliasDraft]) -> Result<Vec<AliasDraft>, StoreError> {
    let mut out = aliases
        .iter()
        .map(AliasDraft::normalized)
        .collect::<Result<Vec<_>, _>>()?;
    out.sort();
    out.dedup();
    Ok(out)
}
