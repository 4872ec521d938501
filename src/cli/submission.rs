//! Arguments shared by commands that submit revisions
//!
//! `create`, `update` and `relate` all add a revision to an edit. By default
//! each run opens its own edit; `--edit` adds to an existing open one, and
//! `--apply` (or `core.auto_apply`) applies the edit when the command is done.

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::Args;
use serde_json::Value;
use tracing::warn;

use super::Context;
use crate::core::edit::{Edit, User};
use crate::core::entity::EntityKind;
use crate::core::error::StoreError;
use crate::core::storage::Storage;
use crate::core::tree::{AliasDraft, RevisionData};

/// Entity content flags
#[derive(Args, Debug, Default)]
pub struct RevisionArgs {
    /// Entity kind (creator, publication, edition, work, publisher)
    #[arg(short, long)]
    pub kind: Option<EntityKind>,

    /// Alias as NAME, NAME|SORT_NAME or NAME|SORT_NAME|LANGUAGE_ID (repeatable, replaces all aliases)
    #[arg(short = 'a', long = "alias")]
    pub aliases: Vec<String>,

    /// Remove all aliases
    #[arg(long, conflicts_with = "aliases")]
    pub clear_aliases: bool,

    /// Annotation text (empty string removes it)
    #[arg(long)]
    pub annotation: Option<String>,

    /// Disambiguation comment (empty string removes it)
    #[arg(short, long)]
    pub disambiguation: Option<String>,

    /// Attribute as KEY=VALUE, VALUE parsed as JSON when possible (repeatable, replaces all attributes)
    #[arg(long = "attr")]
    pub attributes: Vec<String>,

    /// Read the submission from a JSON file; flags override its fields
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,
}

impl RevisionArgs {
    /// Build the submitted data from the JSON file (if any) and the flags
    pub fn to_data(&self) -> Result<RevisionData> {
        let mut data = match &self.file {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid revision data in {}", path.display()))?
            }
            None => RevisionData::default(),
        };

        if self.kind.is_some() {
            data.kind = self.kind;
        }
        if self.clear_aliases {
            data.aliases = Some(Vec::new());
        } else if !self.aliases.is_empty() {
            data.aliases = Some(
                self.aliases
                    .iter()
                    .map(|a| parse_alias(a))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        if self.annotation.is_some() {
            data.annotation = self.annotation.clone();
        }
        if self.disambiguation.is_some() {
            data.disambiguation = self.disambiguation.clone();
        }
        if !self.attributes.is_empty() {
            let mut map = serde_json::Map::new();
            for attr in &self.attributes {
                let (key, value) = parse_attribute(attr)?;
                map.insert(key, value);
            }
            data.attributes = Some(map);
        }

        Ok(data)
    }
}

/// Parse `NAME`, `NAME|SORT_NAME` or `NAME|SORT_NAME|LANGUAGE_ID`
pub fn parse_alias(s: &str) -> Result<AliasDraft> {
    let mut parts = s.splitn(3, '|');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        bail!("Alias name is empty: '{}'", s);
    }

    let mut alias = AliasDraft::new(name);
    if let Some(sort_name) = parts.next() {
        alias = alias.with_sort_name(sort_name.trim());
    }
    if let Some(language) = parts.next().map(str::trim).filter(|l| !l.is_empty()) {
        let language_id = language
            .parse::<i64>()
            .with_context(|| format!("Invalid language id in alias '{}'", s))?;
        alias = alias.with_language(language_id);
    }
    Ok(alias)
}

/// Parse `KEY=VALUE`; VALUE is JSON if it parses, a string otherwise
pub fn parse_attribute(s: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = s.split_once('=') else {
        bail!("Attribute must be KEY=VALUE: '{}'", s);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Attribute key is empty: '{}'", s);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Which edit a submission goes into
#[derive(Args, Debug, Default)]
pub struct EditOptions {
    /// Add to this open edit instead of opening a new one
    #[arg(short, long)]
    pub edit: Option<i64>,

    /// Post a note on the edit
    #[arg(short, long)]
    pub note: Option<String>,

    /// Apply the edit when done
    #[arg(long)]
    pub apply: bool,
}

impl EditOptions {
    /// The edit to submit into, opening a new one unless `--edit` was given
    pub fn edit(&self, storage: &Storage, user: &User) -> Result<Edit> {
        match self.edit {
            Some(id) => Ok(storage.get_edit(id)?.ok_or(StoreError::UnknownEdit(id))?),
            None => storage.open_edit(user.id),
        }
    }

    /// Post the note and apply the edit if requested. Returns whether it was applied.
    pub fn finish(&self, storage: &Storage, ctx: &Context, user: &User, edit: &Edit) -> Result<bool> {
        if let Some(note) = &self.note {
            storage.add_edit_note(edit.id, user.id, note)?;
        }

        let auto = ctx.config.core.auto_apply && self.edit.is_none();
        if self.apply || auto {
            storage.apply_edit(edit.id)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Drop an edit this command opened but left empty
    pub fn discard(&self, storage: &Storage, edit: &Edit) -> Result<()> {
        if self.edit.is_none() {
            storage.cancel_edit(edit.id)?;
        }
        Ok(())
    }

    /// Discard the edit after a failed submission, keeping `err` as the
    /// reported error
    pub fn abandon(&self, storage: &Storage, edit: &Edit, err: anyhow::Error) -> anyhow::Error {
        if let Err(discard_err) = self.discard(storage, edit) {
            warn!(edit_id = edit.id, error = %discard_err, "Failed to cancel edit");
        }
        err
    }
}
