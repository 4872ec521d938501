//! Storage - SQLite backend
//!
//! Owns the schema and every read and write against it.
//!
//! # Key Points
//! - Trees and revisions are insert-only
//! - `create_entity` / `update_entity` build revisions from submitted data
//! - Only `apply_edit` moves master pointers
//! - FTS5 over alias names for search

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};
use ulid::Ulid;

use super::edit::{Edit, EditNote, EditStatus, User};
use super::entity::{Entity, EntityData, EntityKind, EntityRedirect};
use super::error::StoreError;
use super::relationship::{Relationship, RelationshipData, RelationshipTree};
use super::revision::{
    EntityRevision, RelationshipRevision, Revision, RevisionType, UpdateOutcome,
};
use super::schema::SCHEMA;
use super::tree::{Alias, Annotation, Disambiguation, EntityTree, RevisionData, TreeDraft};

/// Redirect chains longer than this are treated as broken
const MAX_REDIRECT_HOPS: usize = 32;

/// Database storage
pub struct Storage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Storage {
    /// Open or create a database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;",
        )?;

        let storage = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        storage.init_schema()?;
        debug!(path = %path.display(), "Opened database");

        Ok(storage)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn, path: None };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Database file, `None` for in-memory storage
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to initialize schema")
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn create_user(&self, name: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("user name is empty".to_string()).into());
        }

        let created_at = Utc::now();
        self.conn.execute(
            r#"INSERT INTO "user" (name, created_at) VALUES (?1, ?2)"#,
            params![name, created_at.to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(user_id = id, name, "Created user");

        Ok(User {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                r#"SELECT id, name, created_at FROM "user" WHERE id = ?1"#,
                [id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user(&self, name: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                r#"SELECT id, name, created_at FROM "user" WHERE name = ?1"#,
                [name.trim()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Look a user up by name, creating it on first use
    pub fn get_or_create_user(&self, name: &str) -> Result<User> {
        match self.find_user(name)? {
            Some(user) => Ok(user),
            None => self.create_user(name),
        }
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Start a new open edit for `user_id`
    pub fn open_edit(&self, user_id: i64) -> Result<Edit> {
        if self.get_user(user_id)?.is_none() {
            return Err(StoreError::UnknownUser(user_id).into());
        }

        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO edit (user_id, status, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, EditStatus::Open.code(), created_at.to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(edit_id = id, user_id, "Opened edit");

        Ok(Edit {
            id,
            user_id,
            status: EditStatus::Open,
            created_at,
            revision_ids: Vec::new(),
        })
    }

    pub fn get_edit(&self, id: i64) -> Result<Option<Edit>> {
        load_edit(&self.conn, id)
    }

    /// Edits, newest first
    pub fn list_edits(&self, status: Option<EditStatus>, limit: usize) -> Result<Vec<Edit>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, status, created_at FROM edit
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )?;

        let mut edits = stmt
            .query_map(
                params![status.map(EditStatus::code), limit as i64],
                row_to_edit,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        for edit in &mut edits {
            edit.revision_ids = edit_revision_ids(&self.conn, edit.id)?;
        }

        Ok(edits)
    }

    /// Ids of the edits a revision belongs to
    pub fn edits_for_revision(&self, revision_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT edit_id FROM edit_revision WHERE revision_id = ?1 ORDER BY edit_id",
        )?;
        let ids = stmt
            .query_map([revision_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Post a discussion note on an edit, whatever its status
    pub fn add_edit_note(&self, edit_id: i64, user_id: i64, content: &str) -> Result<EditNote> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::InvalidInput("note is empty".to_string()).into());
        }
        if load_edit(&self.conn, edit_id)?.is_none() {
            return Err(StoreError::UnknownEdit(edit_id).into());
        }
        if self.get_user(user_id)?.is_none() {
            return Err(StoreError::UnknownUser(user_id).into());
        }

        let posted_at = Utc::now();
        self.conn.execute(
            "INSERT INTO edit_note (user_id, edit_id, content, posted_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, edit_id, content, posted_at.to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(note_id = id, edit_id, user_id, "Posted edit note");

        Ok(EditNote {
            id,
            user_id,
            edit_id,
            content: content.to_string(),
            posted_at,
        })
    }

    /// Notes of an edit in posting order
    pub fn edit_notes(&self, edit_id: i64) -> Result<Vec<EditNote>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, edit_id, content, posted_at FROM edit_note WHERE edit_id = ?1 ORDER BY id",
        )?;
        let notes = stmt
            .query_map([edit_id], |row| {
                Ok(EditNote {
                    id: row.get("id")?,
                    user_id: row.get("user_id")?,
                    edit_id: row.get("edit_id")?,
                    content: row.get("content")?,
                    posted_at: parse_time(row, "posted_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Make every revision of an open edit the master of its entity or
    /// relationship, in revision order. Returns how many pointers moved.
    pub fn apply_edit(&self, edit_id: i64) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let edit = load_edit(&tx, edit_id)?.ok_or(StoreError::UnknownEdit(edit_id))?;
        if !edit.is_open() {
            return Err(StoreError::EditNotOpen {
                id: edit_id,
                status: edit.status,
            }
            .into());
        }

        let now = Utc::now().to_rfc3339();
        let mut moved = 0;
        for revision_id in &edit.revision_ids {
            moved += tx.execute(
                r#"
                UPDATE entity SET master_revision_id = ?1, last_updated = ?2
                WHERE gid = (SELECT entity_gid FROM entity_revision WHERE id = ?1)
                "#,
                params![revision_id, now],
            )?;
            moved += tx.execute(
                r#"
                UPDATE rel SET master_revision_id = ?1, last_updated = ?2
                WHERE id = (SELECT relationship_id FROM rel_revision WHERE id = ?1)
                "#,
                params![revision_id, now],
            )?;
        }

        set_edit_status(&tx, edit_id, EditStatus::Applied)?;
        tx.commit()?;
        info!(edit_id, revisions = edit.revision_ids.len(), moved, "Applied edit");

        Ok(moved)
    }

    /// Close an open edit without applying it
    pub fn cancel_edit(&self, edit_id: i64) -> Result<()> {
        let edit = load_edit(&self.conn, edit_id)?.ok_or(StoreError::UnknownEdit(edit_id))?;
        if !edit.is_open() {
            return Err(StoreError::EditNotOpen {
                id: edit_id,
                status: edit.status,
            }
            .into());
        }
        set_edit_status(&self.conn, edit_id, EditStatus::Cancelled)?;
        info!(edit_id, "Cancelled edit");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Revision factories
    // ------------------------------------------------------------------

    /// Create a new entity and its first revision inside `edit_id`
    ///
    /// The entity has no master revision until the edit is applied.
    /// `data.gid` is ignored: new entities always get a fresh gid.
    pub fn create_entity(
        &self,
        user_id: i64,
        edit_id: i64,
        data: &RevisionData,
    ) -> Result<EntityRevision> {
        let draft = TreeDraft::from_data(data)?;

        let tx = self.conn.unchecked_transaction()?;
        require_open_edit(&tx, edit_id, user_id)?;

        let entity = Entity::new();
        tx.execute(
            "INSERT INTO entity (gid, last_updated, master_revision_id) VALUES (?1, ?2, NULL)",
            params![entity.gid.to_string(), entity.last_updated.to_rfc3339()],
        )?;

        let tree_id = insert_tree(&tx, &draft, None)?;
        let revision = insert_revision(&tx, user_id, edit_id, RevisionType::Entity)?;
        tx.execute(
            "INSERT INTO entity_revision (id, entity_gid, entity_tree_id) VALUES (?1, ?2, ?3)",
            params![revision.id, entity.gid.to_string(), tree_id],
        )?;
        tx.commit()?;

        info!(gid = %entity.gid, revision_id = revision.id, edit_id, kind = %draft.kind, "Created entity");

        Ok(EntityRevision {
            revision,
            entity_gid: entity.gid,
            entity_tree_id: tree_id,
        })
    }

    /// Submit changes to an existing entity inside `edit_id`
    ///
    /// The new tree is the master tree with the submitted fields replaced.
    /// Nothing is written unless it differs from the master tree.
    pub fn update_entity(
        &self,
        user_id: i64,
        edit_id: i64,
        data: &RevisionData,
    ) -> Result<UpdateOutcome> {
        let requested = data.gid.ok_or(StoreError::MissingField("gid"))?;

        let tx = self.conn.unchecked_transaction()?;
        require_open_edit(&tx, edit_id, user_id)?;

        let Some(gid) = resolve_gid(&tx, requested)? else {
            debug!(gid = %requested, "Update for unknown entity");
            return Ok(UpdateOutcome::UnknownEntity);
        };
        let entity = load_entity(&tx, &gid)?.ok_or(StoreError::UnknownEntity(gid))?;
        let Some(master_id) = entity.master_revision_id else {
            debug!(gid = %gid, "Update for entity without master revision");
            return Ok(UpdateOutcome::NoMasterRevision);
        };

        let old_tree = load_revision_tree(&tx, master_id)?.with_context(|| {
            format!("Master revision {} of {} has no tree", master_id, gid)
        })?;
        let old = old_tree.draft();
        let new = old.apply(data)?;
        if new == old {
            debug!(gid = %gid, "Update leaves entity unchanged");
            return Ok(UpdateOutcome::Unchanged);
        }

        let tree_id = insert_tree(&tx, &new, Some(&old_tree))?;
        let revision = insert_revision(&tx, user_id, edit_id, RevisionType::Entity)?;
        tx.execute(
            "INSERT INTO entity_revision (id, entity_gid, entity_tree_id) VALUES (?1, ?2, ?3)",
            params![revision.id, gid.to_string(), tree_id],
        )?;
        tx.commit()?;

        info!(gid = %gid, revision_id = revision.id, edit_id, "Updated entity");

        Ok(UpdateOutcome::Created(EntityRevision {
            revision,
            entity_gid: gid,
            entity_tree_id: tree_id,
        }))
    }

    /// Create a relationship between two entities inside `edit_id`
    pub fn create_relationship(
        &self,
        user_id: i64,
        edit_id: i64,
        data: &RelationshipData,
    ) -> Result<RelationshipRevision> {
        let data = data.validated()?;

        let tx = self.conn.unchecked_transaction()?;
        require_open_edit(&tx, edit_id, user_id)?;

        let source = resolve_gid(&tx, data.source_gid)?
            .ok_or(StoreError::UnknownEntity(data.source_gid))?;
        let target = resolve_gid(&tx, data.target_gid)?
            .ok_or(StoreError::UnknownEntity(data.target_gid))?;
        if source == target {
            return Err(StoreError::InvalidInput(format!(
                "{} and {} are the same entity",
                data.source_gid, data.target_gid
            ))
            .into());
        }

        tx.execute(
            "INSERT INTO rel (last_updated, master_revision_id) VALUES (?1, NULL)",
            [Utc::now().to_rfc3339()],
        )?;
        let relationship_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO rel_tree (relationship_type, source_gid, target_gid) VALUES (?1, ?2, ?3)",
            params![
                data.relationship_type,
                source.to_string(),
                target.to_string()
            ],
        )?;
        let relationship_tree_id = tx.last_insert_rowid();

        let revision = insert_revision(&tx, user_id, edit_id, RevisionType::Relationship)?;
        tx.execute(
            "INSERT INTO rel_revision (id, relationship_id, relationship_tree_id) VALUES (?1, ?2, ?3)",
            params![revision.id, relationship_id, relationship_tree_id],
        )?;
        tx.commit()?;

        info!(
            relationship_id,
            revision_id = revision.id,
            relationship_type = %data.relationship_type,
            "Created relationship"
        );

        Ok(RelationshipRevision {
            revision,
            relationship_id,
            relationship_tree_id,
        })
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Get an entity by exact gid (redirects are not followed)
    pub fn get_entity(&self, gid: &Ulid) -> Result<Option<Entity>> {
        load_entity(&self.conn, gid)
    }

    /// Follow redirects to the gid of an existing entity
    pub fn resolve_gid(&self, gid: Ulid) -> Result<Option<Ulid>> {
        resolve_gid(&self.conn, gid)
    }

    /// Master tree of an entity, following redirects
    pub fn master_tree(&self, gid: Ulid) -> Result<Option<EntityTree>> {
        let Some(gid) = resolve_gid(&self.conn, gid)? else {
            return Ok(None);
        };
        match load_entity(&self.conn, &gid)?.and_then(|e| e.master_revision_id) {
            Some(master_id) => load_revision_tree(&self.conn, master_id),
            None => Ok(None),
        }
    }

    pub fn get_entity_tree(&self, tree_id: i64) -> Result<Option<EntityTree>> {
        load_tree(&self.conn, tree_id)
    }

    pub fn get_entity_revision(&self, revision_id: i64) -> Result<Option<EntityRevision>> {
        let revision = self
            .conn
            .query_row(
                &format!("{} WHERE r.id = ?1", ENTITY_REVISION_SELECT),
                [revision_id],
                row_to_entity_revision,
            )
            .optional()?;
        Ok(revision)
    }

    /// All revisions of an entity, oldest first
    pub fn entity_history(&self, gid: &Ulid) -> Result<Vec<EntityRevision>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE er.entity_gid = ?1 ORDER BY r.id",
            ENTITY_REVISION_SELECT
        ))?;
        let revisions = stmt
            .query_map([gid.to_string()], row_to_entity_revision)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(revisions)
    }

    pub fn get_relationship(&self, id: i64) -> Result<Option<Relationship>> {
        let relationship = self
            .conn
            .query_row(
                "SELECT id, last_updated, master_revision_id FROM rel WHERE id = ?1",
                [id],
                |row| {
                    Ok(Relationship {
                        id: row.get("id")?,
                        last_updated: parse_time(row, "last_updated")?,
                        master_revision_id: row.get("master_revision_id")?,
                    })
                },
            )
            .optional()?;
        Ok(relationship)
    }

    /// Master relationship trees with the entity at either end
    ///
    /// Follows redirects both ways: `gid` is resolved first, relationships
    /// stored against gids merged into it are included, and endpoints are
    /// reported as their current gids.
    pub fn relationships_of(&self, gid: &Ulid) -> Result<Vec<RelationshipTree>> {
        let Some(gid) = resolve_gid(&self.conn, *gid)? else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn.prepare(
            r#"
            WITH RECURSIVE merged(gid) AS (
                SELECT ?1
                UNION
                SELECT er.source_gid FROM entity_redirect er
                JOIN merged m ON er.target_gid = m.gid
            )
            SELECT t.id, t.relationship_type, t.source_gid, t.target_gid
            FROM rel r
            JOIN rel_revision rr ON rr.id = r.master_revision_id
            JOIN rel_tree t ON t.id = rr.relationship_tree_id
            WHERE t.source_gid IN (SELECT gid FROM merged)
               OR t.target_gid IN (SELECT gid FROM merged)
            ORDER BY r.id
            "#,
        )?;
        let trees = stmt
            .query_map([gid.to_string()], |row| {
                Ok(RelationshipTree {
                    id: row.get("id")?,
                    relationship_type: row.get("relationship_type")?,
                    source_gid: parse_ulid(row, "source_gid")?,
                    target_gid: parse_ulid(row, "target_gid")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        trees
            .into_iter()
            .map(|mut tree| {
                tree.source_gid = resolve_gid(&self.conn, tree.source_gid)?.unwrap_or(tree.source_gid);
                tree.target_gid = resolve_gid(&self.conn, tree.target_gid)?.unwrap_or(tree.target_gid);
                Ok(tree)
            })
            .collect()
    }

    /// Redirect `source` to `target`, e.g. after merging duplicates
    ///
    /// The stored target is `target` with its own redirects resolved.
    pub fn redirect(&self, source: Ulid, target: Ulid) -> Result<EntityRedirect> {
        if source == target {
            return Err(StoreError::RedirectCycle {
                source_gid: source,
                target_gid: target,
            }
            .into());
        }

        let tx = self.conn.unchecked_transaction()?;
        if load_entity(&tx, &source)?.is_none() {
            return Err(StoreError::UnknownEntity(source).into());
        }
        if redirect_target(&tx, &source)?.is_some() {
            return Err(
                StoreError::InvalidInput(format!("{} is already redirected", source)).into(),
            );
        }
        let resolved = resolve_gid(&tx, target)?.ok_or(StoreError::UnknownEntity(target))?;
        if resolved == source {
            return Err(StoreError::RedirectCycle {
                source_gid: source,
                target_gid: target,
            }
            .into());
        }

        // Keep every redirect one hop from its final target
        let repointed = tx.execute(
            "UPDATE entity_redirect SET target_gid = ?2 WHERE target_gid = ?1",
            params![source.to_string(), resolved.to_string()],
        )?;
        tx.execute(
            "INSERT INTO entity_redirect (source_gid, target_gid) VALUES (?1, ?2)",
            params![source.to_string(), resolved.to_string()],
        )?;
        tx.commit()?;
        info!(source = %source, target = %resolved, repointed, "Redirected entity");

        Ok(EntityRedirect {
            source_gid: source,
            target_gid: resolved,
        })
    }

    /// Escape and prepare query for FTS5
    /// Words are quoted and joined with OR
    fn escape_fts_query(query: &str) -> String {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| format!("\"{}\"", w.replace('"', "\"\"")))
            .collect();
        words.join(" OR ")
    }

    /// Full-text search over alias names of master trees
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let fts_query = Self::escape_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        // bm25() only works in a plain query over the FTS table, so rank
        // the matching aliases first and join the results afterwards
        let mut stmt = self.conn.prepare(
            r#"
            WITH matched AS MATERIALIZED (
                SELECT rowid AS alias_id, bm25(alias_fts, 10.0, 5.0) AS score
                FROM alias_fts
                WHERE alias_fts MATCH ?1
            )
            SELECT e.gid AS gid, MIN(m.score) AS best
            FROM matched m
            JOIN entity_tree_alias eta ON eta.alias_id = m.alias_id
            JOIN entity_revision er ON er.entity_tree_id = eta.entity_tree_id
            JOIN entity e ON e.master_revision_id = er.id
            WHERE e.gid NOT IN (SELECT source_gid FROM entity_redirect)
            GROUP BY e.gid
            ORDER BY best, e.gid
            LIMIT ?2
            "#,
        )?;

        let gids = stmt
            .query_map(params![fts_query, limit as i64], |row| parse_ulid(row, "gid"))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut hits = Vec::with_capacity(gids.len());
        for gid in gids {
            if let Some(tree) = self.master_tree(gid)? {
                hits.push(SearchHit {
                    gid,
                    kind: tree.data.kind,
                    name: tree.display_name().map(str::to_string),
                    disambiguation: tree.disambiguation.map(|d| d.comment),
                });
            }
        }
        debug!(query, hits = hits.len(), "Searched aliases");

        Ok(hits)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        let edits_with = |status: EditStatus| -> Result<usize> {
            let n: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM edit WHERE status = ?1",
                [status.code()],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };

        Ok(StorageStats {
            users: count(r#"SELECT COUNT(*) FROM "user""#)?,
            entities: count("SELECT COUNT(*) FROM entity")?,
            accepted_entities: count(
                "SELECT COUNT(*) FROM entity WHERE master_revision_id IS NOT NULL",
            )?,
            redirects: count("SELECT COUNT(*) FROM entity_redirect")?,
            revisions: count("SELECT COUNT(*) FROM revision")?,
            relationships: count(
                "SELECT COUNT(*) FROM rel WHERE master_revision_id IS NOT NULL",
            )?,
            open_edits: edits_with(EditStatus::Open)?,
            applied_edits: edits_with(EditStatus::Applied)?,
            cancelled_edits: edits_with(EditStatus::Cancelled)?,
        })
    }
}

/// An entity matched by search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub gid: Ulid,
    pub kind: EntityKind,
    pub name: Option<String>,
    pub disambiguation: Option<String>,
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub users: usize,
    pub entities: usize,
    /// Entities with a master revision
    pub accepted_entities: usize,
    pub redirects: usize,
    pub revisions: usize,
    /// Relationships with a master revision
    pub relationships: usize,
    pub open_edits: usize,
    pub applied_edits: usize,
    pub cancelled_edits: usize,
}

const ENTITY_REVISION_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.created_at, r.type, er.entity_gid, er.entity_tree_id
    FROM entity_revision er
    JOIN revision r ON r.id = er.id
"#;

// ----------------------------------------------------------------------
// Helpers shared by plain connections and transactions
// ----------------------------------------------------------------------

fn require_open_edit(conn: &Connection, edit_id: i64, user_id: i64) -> Result<()> {
    let edit = load_edit(conn, edit_id)?.ok_or(StoreError::UnknownEdit(edit_id))?;
    if edit.user_id != user_id {
        return Err(StoreError::EditNotOwned { edit_id, user_id }.into());
    }
    if !edit.is_open() {
        return Err(StoreError::EditNotOpen {
            id: edit_id,
            status: edit.status,
        }
        .into());
    }
    Ok(())
}

fn set_edit_status(conn: &Connection, edit_id: i64, status: EditStatus) -> Result<()> {
    conn.execute(
        "UPDATE edit SET status = ?2 WHERE id = ?1",
        params![edit_id, status.code()],
    )?;
    Ok(())
}

fn load_edit(conn: &Connection, id: i64) -> Result<Option<Edit>> {
    let edit = conn
        .query_row(
            "SELECT id, user_id, status, created_at FROM edit WHERE id = ?1",
            [id],
            row_to_edit,
        )
        .optional()?;

    match edit {
        Some(mut edit) => {
            edit.revision_ids = edit_revision_ids(conn, id)?;
            Ok(Some(edit))
        }
        None => Ok(None),
    }
}

fn edit_revision_ids(conn: &Connection, edit_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT revision_id FROM edit_revision WHERE edit_id = ?1 ORDER BY revision_id",
    )?;
    let ids = stmt
        .query_map([edit_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Insert the base revision row and link it to its edit
fn insert_revision(
    conn: &Connection,
    user_id: i64,
    edit_id: i64,
    revision_type: RevisionType,
) -> Result<Revision> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO revision (user_id, created_at, type) VALUES (?1, ?2, ?3)",
        params![user_id, created_at.to_rfc3339(), revision_type.code()],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO edit_revision (edit_id, revision_id) VALUES (?1, ?2)",
        params![edit_id, id],
    )?;

    Ok(Revision {
        id,
        user_id,
        created_at,
        revision_type,
    })
}

/// Write a tree, reusing rows of `base` for parts whose content is unchanged
fn insert_tree(conn: &Connection, draft: &TreeDraft, base: Option<&EntityTree>) -> Result<i64> {
    let annotation_id = match &draft.annotation {
        None => None,
        Some(content) => match base
            .and_then(|b| b.annotation.as_ref())
            .filter(|a| &a.content == content)
        {
            Some(existing) => Some(existing.id),
            None => {
                conn.execute(
                    "INSERT INTO annotation (content, created_at) VALUES (?1, ?2)",
                    params![content, Utc::now().to_rfc3339()],
                )?;
                Some(conn.last_insert_rowid())
            }
        },
    };

    let disambiguation_id = match &draft.disambiguation {
        None => None,
        Some(comment) => match base
            .and_then(|b| b.disambiguation.as_ref())
            .filter(|d| &d.comment == comment)
        {
            Some(existing) => Some(existing.id),
            None => {
                conn.execute(
                    "INSERT INTO disambiguation (comment) VALUES (?1)",
                    [comment],
                )?;
                Some(conn.last_insert_rowid())
            }
        },
    };

    let data_id = match base
        .map(|b| &b.data)
        .filter(|d| d.kind == draft.kind && d.attributes == draft.attributes)
    {
        Some(existing) => existing.id,
        None => {
            conn.execute(
                "INSERT INTO entity_data (type, attributes) VALUES (?1, ?2)",
                params![
                    draft.kind.code(),
                    serde_json::to_string(&draft.attributes)?
                ],
            )?;
            conn.last_insert_rowid()
        }
    };

    conn.execute(
        "INSERT INTO entity_tree (annotation_id, disambiguation_id, data_id) VALUES (?1, ?2, ?3)",
        params![annotation_id, disambiguation_id, data_id],
    )?;
    let tree_id = conn.last_insert_rowid();

    let base_aliases = base.map(|b| b.aliases.as_slice()).unwrap_or_default();
    for alias in &draft.aliases {
        let alias_id = match base_aliases.iter().find(|a| a.draft() == *alias) {
            Some(existing) => existing.id,
            None => {
                conn.execute(
                    "INSERT INTO alias (name, sort_name, language_id) VALUES (?1, ?2, ?3)",
                    params![alias.name, alias.sort_name, alias.language_id],
                )?;
                conn.last_insert_rowid()
            }
        };
        conn.execute(
            "INSERT INTO entity_tree_alias (entity_tree_id, alias_id) VALUES (?1, ?2)",
            params![tree_id, alias_id],
        )?;
    }

    debug!(tree_id, aliases = draft.aliases.len(), "Inserted entity tree");
    Ok(tree_id)
}

fn load_entity(conn: &Connection, gid: &Ulid) -> Result<Option<Entity>> {
    let entity = conn
        .query_row(
            "SELECT gid, last_updated, master_revision_id FROM entity WHERE gid = ?1",
            [gid.to_string()],
            |row| {
                Ok(Entity {
                    gid: parse_ulid(row, "gid")?,
                    last_updated: parse_time(row, "last_updated")?,
                    master_revision_id: row.get("master_revision_id")?,
                })
            },
        )
        .optional()?;
    Ok(entity)
}

fn redirect_target(conn: &Connection, gid: &Ulid) -> Result<Option<Ulid>> {
    let target = conn
        .query_row(
            "SELECT target_gid FROM entity_redirect WHERE source_gid = ?1",
            [gid.to_string()],
            |row| parse_ulid(row, "target_gid"),
        )
        .optional()?;
    Ok(target)
}

fn resolve_gid(conn: &Connection, gid: Ulid) -> Result<Option<Ulid>> {
    let mut current = gid;
    for _ in 0..MAX_REDIRECT_HOPS {
        match redirect_target(conn, &current)? {
            Some(next) => current = next,
            None => {
                return Ok(load_entity(conn, &current)?.map(|e| e.gid));
            }
        }
    }
    anyhow::bail!("Redirect chain from {} is longer than {} hops", gid, MAX_REDIRECT_HOPS)
}

fn load_revision_tree(conn: &Connection, revision_id: i64) -> Result<Option<EntityTree>> {
    let tree_id: Option<i64> = conn
        .query_row(
            "SELECT entity_tree_id FROM entity_revision WHERE id = ?1",
            [revision_id],
            |row| row.get(0),
        )
        .optional()?;
    match tree_id {
        Some(tree_id) => load_tree(conn, tree_id),
        None => Ok(None),
    }
}

fn load_tree(conn: &Connection, tree_id: i64) -> Result<Option<EntityTree>> {
    let tree = conn
        .query_row(
            r#"
            SELECT t.id,
                   t.annotation_id, a.content, a.created_at,
                   t.disambiguation_id, d.comment,
                   t.data_id, ed.type, ed.attributes
            FROM entity_tree t
            LEFT JOIN annotation a ON a.id = t.annotation_id
            LEFT JOIN disambiguation d ON d.id = t.disambiguation_id
            JOIN entity_data ed ON ed.id = t.data_id
            WHERE t.id = ?1
            "#,
            [tree_id],
            row_to_tree,
        )
        .optional()?;

    let Some(mut tree) = tree else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        r#"
        SELECT al.id, al.name, al.sort_name, al.language_id
        FROM entity_tree_alias eta
        JOIN alias al ON al.id = eta.alias_id
        WHERE eta.entity_tree_id = ?1
        ORDER BY al.sort_name, al.name, al.id
        "#,
    )?;
    tree.aliases = stmt
        .query_map([tree_id], |row| {
            Ok(Alias {
                id: row.get("id")?,
                name: row.get("name")?,
                sort_name: row.get("sort_name")?,
                language_id: row.get("language_id")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(tree))
}

// ----------------------------------------------------------------------
// Row conversion
// ----------------------------------------------------------------------

fn conversion_error(
    row: &Row,
    column: &str,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_ulid(row: &Row, column: &str) -> rusqlite::Result<Ulid> {
    let s: String = row.get(column)?;
    Ulid::from_string(&s).map_err(|e| conversion_error(row, column, e))
}

fn parse_time(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, column, e))
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: parse_time(row, "created_at")?,
    })
}

fn row_to_edit(row: &Row) -> rusqlite::Result<Edit> {
    let code: i64 = row.get("status")?;
    let status = EditStatus::from_code(code)
        .ok_or_else(|| conversion_error(row, "status", format!("unknown edit status {}", code)))?;

    Ok(Edit {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        status,
        created_at: parse_time(row, "created_at")?,
        revision_ids: Vec::new(),
    })
}

fn row_to_entity_revision(row: &Row) -> rusqlite::Result<EntityRevision> {
    let code: i64 = row.get("type")?;
    let revision_type = RevisionType::from_code(code)
        .ok_or_else(|| conversion_error(row, "type", format!("unknown revision type {}", code)))?;

    Ok(EntityRevision {
        revision: Revision {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            created_at: parse_time(row, "created_at")?,
            revision_type,
        },
        entity_gid: parse_ulid(row, "entity_gid")?,
        entity_tree_id: row.get("entity_tree_id")?,
    })
}

fn row_to_tree(row: &Row) -> rusqlite::Result<EntityTree> {
    let annotation = match row.get::<_, Option<i64>>("annotation_id")? {
        Some(id) => Some(Annotation {
            id,
            content: row.get("content")?,
            created_at: parse_time(row, "created_at")?,
        }),
        None => None,
    };

    let disambiguation = match row.get::<_, Option<i64>>("disambiguation_id")? {
        Some(id) => Some(Disambiguation {
            id,
            comment: row.get("comment")?,
        }),
        None => None,
    };

    let code: i64 = row.get("type")?;
    let kind = EntityKind::from_code(code)
        .ok_or_else(|| conversion_error(row, "type", format!("unknown entity type {}", code)))?;
    let attributes_json: String = row.get("attributes")?;
    let attributes =
        serde_json::from_str(&attributes_json).map_err(|e| conversion_error(row, "attributes", e))?;

    Ok(EntityTree {
        id: row.get("id")?,
        annotation,
        disambiguation,
        data: EntityData {
            id: row.get("data_id")?,
            kind,
            attributes,
        },
        aliases: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::AliasDraft;
    use serde_json::json;

    fn setup() -> Result<(Storage, User, Edit)> {
        let storage = Storage::open_memory()?;
        let user = storage.create_user("alice")?;
        let edit = storage.open_edit(user.id)?;
        Ok((storage, user, edit))
    }

    fn work(name: &str) -> RevisionData {
        RevisionData {
            kind: Some(EntityKind::Work),
            aliases: Some(vec![AliasDraft::new(name)]),
            ..Default::default()
        }
    }

    /// Create an entity in its own edit and apply it
    fn accepted(storage: &Storage, user: &User, data: &RevisionData) -> Result<Ulid> {
        let edit = storage.open_edit(user.id)?;
        let revision = storage.create_entity(user.id, edit.id, data)?;
        storage.apply_edit(edit.id)?;
        Ok(revision.entity_gid)
    }

    fn store_error(err: &anyhow::Error) -> Option<&StoreError> {
        err.downcast_ref::<StoreError>()
    }

    #[test]
    fn test_users() -> Result<()> {
        let storage = Storage::open_memory()?;
        let alice = storage.get_or_create_user("alice")?;
        let again = storage.get_or_create_user(" alice ")?;
        assert_eq!(alice, again);
        assert_eq!(storage.get_user(alice.id)?, Some(alice));
        assert!(storage.find_user("bob")?.is_none());

        let err = storage.create_user("  ").unwrap_err();
        assert!(matches!(store_error(&err), Some(StoreError::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn test_create_entity() -> Result<()> {
        let (storage, user, edit) = setup()?;
        let mut data = work("Dune");
        data.annotation = Some("First published 1965".to_string());
        data.attributes = Some(json!({"pages": 412}).as_object().cloned().unwrap());

        let revision = storage.create_entity(user.id, edit.id, &data)?;
        assert_eq!(revision.revision.user_id, user.id);
        assert_eq!(revision.revision.revision_type, RevisionType::Entity);

        let entity = storage.get_entity(&revision.entity_gid)?.unwrap();
        assert!(entity.master_revision_id.is_none());

        let tree = storage.get_entity_tree(revision.entity_tree_id)?.unwrap();
        assert_eq!(tree.data.kind, EntityKind::Work);
        assert_eq!(tree.data.attributes["pages"], json!(412));
        assert_eq!(tree.annotation.unwrap().content, "First published 1965");
        assert!(tree.disambiguation.is_none());
        assert_eq!(tree.aliases.len(), 1);
        assert_eq!(tree.aliases[0].sort_name, "Dune");

        let edit = storage.get_edit(edit.id)?.unwrap();
        assert_eq!(edit.revision_ids, vec![revision.id()]);
        Ok(())
    }

    #[test]
    fn test_create_requires_kind() -> Result<()> {
        let (storage, user, edit) = setup()?;
        let err = storage
            .create_entity(user.id, edit.id, &RevisionData::default())
            .unwrap_err();
        assert_eq!(store_error(&err), Some(&StoreError::MissingField("kind")));
        assert_eq!(storage.stats()?.entities, 0);
        Ok(())
    }

    #[test]
    fn test_apply_sets_master() -> Result<()> {
        let (storage, user, edit) = setup()?;
        let revision = storage.create_entity(user.id, edit.id, &work("Dune"))?;
        let before = storage.get_entity(&revision.entity_gid)?.unwrap();

        assert_eq!(storage.apply_edit(edit.id)?, 1);

        let entity = storage.get_entity(&revision.entity_gid)?.unwrap();
        assert_eq!(entity.master_revision_id, Some(revision.id()));
        assert!(entity.last_updated >= before.last_updated);
        assert_eq!(
            storage.get_edit(edit.id)?.unwrap().status,
            EditStatus::Applied
        );

        let tree = storage.master_tree(revision.entity_gid)?.unwrap();
        assert_eq!(tree.display_name(), Some("Dune"));
        Ok(())
    }

    #[test]
    fn test_closed_edit_rejects_changes() -> Result<()> {
        let (storage, user, edit) = setup()?;
        storage.create_entity(user.id, edit.id, &work("Dune"))?;
        storage.apply_edit(edit.id)?;

        let err = storage.apply_edit(edit.id).unwrap_err();
        assert_eq!(
            store_error(&err),
            Some(&StoreError::EditNotOpen {
                id: edit.id,
                status: EditStatus::Applied
            })
        );

        let err = storage
            .create_entity(user.id, edit.id, &work("Emma"))
            .unwrap_err();
        assert!(matches!(
            store_error(&err),
            Some(StoreError::EditNotOpen { .. })
        ));

        let err = storage.cancel_edit(edit.id).unwrap_err();
        assert!(matches!(
            store_error(&err),
            Some(StoreError::EditNotOpen { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_edit_ownership() -> Result<()> {
        let (storage, _alice, edit) = setup()?;
        let bob = storage.create_user("bob")?;

        let err = storage
            .create_entity(bob.id, edit.id, &work("Dune"))
            .unwrap_err();
        assert_eq!(
            store_error(&err),
            Some(&StoreError::EditNotOwned {
                edit_id: edit.id,
                user_id: bob.id
            })
        );

        let err = storage.create_entity(bob.id, 999, &work("Dune")).unwrap_err();
        assert_eq!(store_error(&err), Some(&StoreError::UnknownEdit(999)));
        Ok(())
    }

    #[test]
    fn test_cancelled_edit_never_becomes_master() -> Result<()> {
        let (storage, user, edit) = setup()?;
        let revision = storage.create_entity(user.id, edit.id, &work("Dune"))?;
        storage.cancel_edit(edit.id)?;

        assert_eq!(
            storage.get_edit(edit.id)?.unwrap().status,
            EditStatus::Cancelled
        );
        let entity = storage.get_entity(&revision.entity_gid)?.unwrap();
        assert!(entity.master_revision_id.is_none());
        assert_eq!(storage.entity_history(&revision.entity_gid)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_update_creates_revision() -> Result<()> {
        let (storage, user, _) = setup()?;
        let mut data = work("Dune");
        data.annotation = Some("note".to_string());
        let gid = accepted(&storage, &user, &data)?;
        let old_tree = storage.master_tree(gid)?.unwrap();

        let edit = storage.open_edit(user.id)?;
        let update = RevisionData {
            gid: Some(gid),
            disambiguation: Some("novel".to_string()),
            ..Default::default()
        };
        let outcome = storage.update_entity(user.id, edit.id, &update)?;
        let revision = outcome.into_revision().unwrap();
        assert_eq!(revision.entity_gid, gid);

        // Master does not move until the edit is applied
        assert_eq!(storage.master_tree(gid)?.unwrap(), old_tree);

        let new_tree = storage.get_entity_tree(revision.entity_tree_id)?.unwrap();
        assert_eq!(new_tree.disambiguation.as_ref().unwrap().comment, "novel");
        // Unchanged parts reuse the stored rows
        assert_eq!(new_tree.annotation, old_tree.annotation);
        assert_eq!(new_tree.data.id, old_tree.data.id);
        assert_eq!(new_tree.aliases, old_tree.aliases);

        storage.apply_edit(edit.id)?;
        assert_eq!(storage.master_tree(gid)?.unwrap().id, new_tree.id);
        assert_eq!(storage.entity_history(&gid)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_update_unchanged() -> Result<()> {
        let (storage, user, _) = setup()?;
        let gid = accepted(&storage, &user, &work("Dune"))?;

        let edit = storage.open_edit(user.id)?;
        let mut same = work("Dune");
        same.gid = Some(gid);
        assert_eq!(
            storage.update_entity(user.id, edit.id, &same)?,
            UpdateOutcome::Unchanged
        );
        assert_eq!(storage.entity_history(&gid)?.len(), 1);
        assert!(storage.get_edit(edit.id)?.unwrap().revision_ids.is_empty());
        Ok(())
    }

    #[test]
    fn test_update_unknown_and_unaccepted() -> Result<()> {
        let (storage, user, edit) = setup()?;

        let unknown = RevisionData {
            gid: Some(Ulid::new()),
            ..work("Dune")
        };
        assert_eq!(
            storage.update_entity(user.id, edit.id, &unknown)?,
            UpdateOutcome::UnknownEntity
        );

        let pending = storage.create_entity(user.id, edit.id, &work("Dune"))?;
        let update = RevisionData {
            gid: Some(pending.entity_gid),
            annotation: Some("x".to_string()),
            ..Default::default()
        };
        assert_eq!(
            storage.update_entity(user.id, edit.id, &update)?,
            UpdateOutcome::NoMasterRevision
        );

        let err = storage
            .update_entity(user.id, edit.id, &RevisionData::default())
            .unwrap_err();
        assert_eq!(store_error(&err), Some(&StoreError::MissingField("gid")));
        Ok(())
    }

    #[test]
    fn test_update_alias_reuse() -> Result<()> {
        let (storage, user, _) = setup()?;
        let gid = accepted(&storage, &user, &work("Dune"))?;
        let old_alias = storage.master_tree(gid)?.unwrap().aliases[0].clone();

        let edit = storage.open_edit(user.id)?;
        let update = RevisionData {
            gid: Some(gid),
            aliases: Some(vec![
                AliasDraft::new("Dune"),
                AliasDraft::new("Duna").with_language(7),
            ]),
            ..Default::default()
        };
        storage.update_entity(user.id, edit.id, &update)?;
        storage.apply_edit(edit.id)?;

        let tree = storage.master_tree(gid)?.unwrap();
        assert_eq!(tree.aliases.len(), 2);
        assert!(tree.aliases.contains(&old_alias));
        let duna = tree.aliases.iter().find(|a| a.name == "Duna").unwrap();
        assert_eq!(duna.language_id, Some(7));
        Ok(())
    }

    #[test]
    fn test_update_kind_mismatch() -> Result<()> {
        let (storage, user, _) = setup()?;
        let gid = accepted(&storage, &user, &work("Dune"))?;

        let edit = storage.open_edit(user.id)?;
        let update = RevisionData {
            gid: Some(gid),
            kind: Some(EntityKind::Creator),
            ..Default::default()
        };
        let err = storage.update_entity(user.id, edit.id, &update).unwrap_err();
        assert!(matches!(
            store_error(&err),
            Some(StoreError::KindMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_latest_applied_edit_wins() -> Result<()> {
        let (storage, user, _) = setup()?;
        let gid = accepted(&storage, &user, &work("Dune"))?;

        let first = storage.open_edit(user.id)?;
        let second = storage.open_edit(user.id)?;
        let a = RevisionData {
            gid: Some(gid),
            annotation: Some("first".to_string()),
            ..Default::default()
        };
        let b = RevisionData {
            gid: Some(gid),
            annotation: Some("second".to_string()),
            ..Default::default()
        };
        storage.update_entity(user.id, first.id, &a)?;
        storage.update_entity(user.id, second.id, &b)?;

        storage.apply_edit(second.id)?;
        storage.apply_edit(first.id)?;

        let tree = storage.master_tree(gid)?.unwrap();
        assert_eq!(tree.annotation.unwrap().content, "first");
        Ok(())
    }

    #[test]
    fn test_edit_notes() -> Result<()> {
        let (storage, user, edit) = setup()?;
        let bob = storage.create_user("bob")?;

        storage.add_edit_note(edit.id, user.id, "Adding the novel")?;
        storage.add_edit_note(edit.id, bob.id, "  Looks good  ")?;

        let notes = storage.edit_notes(edit.id)?;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].content, "Adding the novel");
        assert_eq!(notes[1].content, "Looks good");
        assert_eq!(notes[1].user_id, bob.id);

        let err = storage.add_edit_note(edit.id, user.id, " ").unwrap_err();
        assert!(matches!(store_error(&err), Some(StoreError::InvalidInput(_))));
        let err = storage.add_edit_note(42, user.id, "hi").unwrap_err();
        assert_eq!(store_error(&err), Some(&StoreError::UnknownEdit(42)));
        Ok(())
    }

    #[test]
    fn test_list_edits() -> Result<()> {
        let (storage, user, first) = setup()?;
        let second = storage.open_edit(user.id)?;
        storage.cancel_edit(first.id)?;

        let all = storage.list_edits(None, 10)?;
        assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let open = storage.list_edits(Some(EditStatus::Open), 10)?;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second.id);

        assert_eq!(storage.list_edits(None, 1)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_relationships() -> Result<()> {
        let (storage, user, _) = setup()?;
        let herbert = accepted(
            &storage,
            &user,
            &RevisionData {
                kind: Some(EntityKind::Creator),
                aliases: Some(vec![AliasDraft::new("Frank Herbert")]),
                ..Default::default()
            },
        )?;
        let dune = accepted(&storage, &user, &work("Dune"))?;

        let edit = storage.open_edit(user.id)?;
        let revision = storage.create_relationship(
            user.id,
            edit.id,
            &RelationshipData::new(herbert, "authored", dune),
        )?;
        assert_eq!(revision.revision.revision_type, RevisionType::Relationship);
        assert!(storage.relationships_of(&dune)?.is_empty());
        let pending = storage.get_relationship(revision.relationship_id)?.unwrap();
        assert!(pending.master_revision_id.is_none());

        assert_eq!(storage.apply_edit(edit.id)?, 1);
        let relationship = storage.get_relationship(revision.relationship_id)?.unwrap();
        assert_eq!(relationship.master_revision_id, Some(revision.id()));
        let rels = storage.relationships_of(&dune)?;
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].relationship_type, "authored");
        assert_eq!(rels[0].source_gid, herbert);
        assert_eq!(storage.relationships_of(&herbert)?, rels);

        let edit = storage.open_edit(user.id)?;
        let err = storage
            .create_relationship(
                user.id,
                edit.id,
                &RelationshipData::new(herbert, "authored", Ulid::new()),
            )
            .unwrap_err();
        assert!(matches!(store_error(&err), Some(StoreError::UnknownEntity(_))));
        Ok(())
    }

    #[test]
    fn test_redirects() -> Result<()> {
        let (storage, user, _) = setup()?;
        let dup = accepted(&storage, &user, &work("Dune (dup)"))?;
        let dune = accepted(&storage, &user, &work("Dune"))?;

        let redirect = storage.redirect(dup, dune)?;
        assert_eq!(redirect.target_gid, dune);
        assert_eq!(storage.resolve_gid(dup)?, Some(dune));
        assert_eq!(storage.resolve_gid(dune)?, Some(dune));
        assert_eq!(
            storage.master_tree(dup)?.unwrap().display_name(),
            Some("Dune")
        );
        assert!(storage.resolve_gid(Ulid::new())?.is_none());

        // Updates through the old gid land on the target
        let edit = storage.open_edit(user.id)?;
        let update = RevisionData {
            gid: Some(dup),
            annotation: Some("merged".to_string()),
            ..Default::default()
        };
        let revision = storage
            .update_entity(user.id, edit.id, &update)?
            .into_revision()
            .unwrap();
        assert_eq!(revision.entity_gid, dune);

        let err = storage.redirect(dune, dup).unwrap_err();
        assert!(matches!(
            store_error(&err),
            Some(StoreError::RedirectCycle { .. })
        ));
        let err = storage.redirect(dune, dune).unwrap_err();
        assert!(matches!(
            store_error(&err),
            Some(StoreError::RedirectCycle { .. })
        ));
        let err = storage.redirect(dup, dune).unwrap_err();
        assert!(matches!(store_error(&err), Some(StoreError::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn test_search() -> Result<()> {
        let (storage, user, edit) = setup()?;
        let dune = accepted(&storage, &user, &work("Dune"))?;
        let messiah = accepted(&storage, &user, &work("Dune Messiah"))?;
        accepted(&storage, &user, &work("Emma"))?;
        // Not applied, so not searchable
        storage.create_entity(user.id, edit.id, &work("Dune Encyclopedia"))?;

        let hits = storage.search("dune", 10)?;
        let gids: Vec<Ulid> = hits.iter().map(|h| h.gid).collect();
        assert_eq!(gids.len(), 2);
        assert!(gids.contains(&dune));
        assert!(gids.contains(&messiah));
        assert_eq!(hits[0].kind, EntityKind::Work);

        assert!(storage.search("   ", 10)?.is_empty());
        assert!(storage.search("nothing", 10)?.is_empty());

        storage.redirect(messiah, dune)?;
        assert_eq!(storage.search("messiah", 10)?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_search_ranks_exact_alias_first() -> Result<()> {
        let (storage, user, _) = setup()?;
        let long = accepted(
            &storage,
            &user,
            &work("The Dune Encyclopedia of the Spice Planet Arrakis"),
        )?;
        for title in ["Emma", "Persuasion", "Middlemarch", "Ulysses", "Dracula"] {
            accepted(&storage, &user, &work(title))?;
        }
        let dune = accepted(&storage, &user, &work("Dune"))?;

        let hits = storage.search("dune", 10)?;
        assert_eq!(hits.iter().map(|h| h.gid).collect::<Vec<_>>(), vec![dune, long]);
        assert_eq!(hits[0].name.as_deref(), Some("Dune"));

        assert_eq!(storage.search("dune", 1)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_relationships_follow_redirects() -> Result<()> {
        let (storage, user, _) = setup()?;
        let herbert = accepted(
            &storage,
            &user,
            &RevisionData {
                kind: Some(EntityKind::Creator),
                aliases: Some(vec![AliasDraft::new("Frank Herbert")]),
                ..Default::default()
            },
        )?;
        let dup = accepted(&storage, &user, &work("Dune (dup)"))?;
        let dune = accepted(&storage, &user, &work("Dune"))?;

        let edit = storage.open_edit(user.id)?;
        storage.create_relationship(
            user.id,
            edit.id,
            &RelationshipData::new(herbert, "authored", dup),
        )?;
        storage.apply_edit(edit.id)?;

        storage.redirect(dup, dune)?;

        let rels = storage.relationships_of(&dune)?;
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].source_gid, herbert);
        assert_eq!(rels[0].target_gid, dune);
        assert_eq!(storage.relationships_of(&dup)?, rels);
        assert_eq!(storage.relationships_of(&herbert)?, rels);
        assert!(storage.relationships_of(&Ulid::new())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_long_redirect_chain_stays_resolvable() -> Result<()> {
        let (storage, user, _) = setup()?;
        let mut gids = Vec::new();
        for i in 0..(MAX_REDIRECT_HOPS + 8) {
            gids.push(accepted(&storage, &user, &work(&format!("Copy {}", i)))?);
        }

        // Each merge folds the survivor so far into the next entity
        for pair in gids.windows(2) {
            storage.redirect(pair[0], pair[1])?;
        }

        let last = *gids.last().unwrap();
        for gid in &gids {
            assert_eq!(storage.resolve_gid(*gid)?, Some(last));
        }
        assert_eq!(
            storage.master_tree(gids[0])?.unwrap().display_name(),
            Some(format!("Copy {}", gids.len() - 1).as_str())
        );

        let err = storage.redirect(last, gids[0]).unwrap_err();
        assert!(matches!(
            store_error(&err),
            Some(StoreError::RedirectCycle { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_stats() -> Result<()> {
        let (storage, user, edit) = setup()?;
        storage.create_entity(user.id, edit.id, &work("Dune"))?;
        accepted(&storage, &user, &work("Emma"))?;

        let stats = storage.stats()?;
        assert_eq!(stats.users, 1);
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.accepted_entities, 1);
        assert_eq!(stats.revisions, 2);
        assert_eq!(stats.open_edits, 1);
        assert_eq!(stats.applied_edits, 1);
        assert_eq!(stats.cancelled_edits, 0);
        Ok(())
    }

    #[test]
    fn test_open_file_database() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.db");
        let gid = {
            let storage = Storage::open(&path)?;
            let user = storage.create_user("alice")?;
            accepted(&storage, &user, &work("Dune"))?
        };

        let storage = Storage::open(&path)?;
        assert_eq!(storage.path(), Some(path.as_path()));
        assert!(storage.master_tree(gid)?.is_some());
        Ok(())
    }
}
