//! Database schema
//!
//! Applied on every open. All statements use `IF NOT EXISTS` so re-running
//! is harmless.
//!
//! Rows below `entity`, `rel`, `edit` and `user` are insert-only: trees and
//! revisions are never rewritten, only the master pointers and edit status
//! change.

pub(crate) const SCHEMA: &str = r#"
-- Editors
CREATE TABLE IF NOT EXISTS "user" (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Entities and redirects
CREATE TABLE IF NOT EXISTS entity (
    gid TEXT PRIMARY KEY,
    last_updated TEXT NOT NULL,
    master_revision_id INTEGER REFERENCES entity_revision(id)
);

CREATE TABLE IF NOT EXISTS entity_redirect (
    source_gid TEXT PRIMARY KEY,
    target_gid TEXT NOT NULL REFERENCES entity(gid)
);

-- Tree parts
CREATE TABLE IF NOT EXISTS annotation (
    id INTEGER PRIMARY KEY,
    content TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS disambiguation (
    id INTEGER PRIMARY KEY,
    comment TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS alias (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    sort_name TEXT NOT NULL,
    language_id INTEGER
);

CREATE TABLE IF NOT EXISTS entity_data (
    id INTEGER PRIMARY KEY,
    type INTEGER NOT NULL,
    attributes TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS entity_tree (
    id INTEGER PRIMARY KEY,
    annotation_id INTEGER REFERENCES annotation(id),
    disambiguation_id INTEGER REFERENCES disambiguation(id),
    data_id INTEGER NOT NULL REFERENCES entity_data(id)
);

CREATE TABLE IF NOT EXISTS entity_tree_alias (
    entity_tree_id INTEGER NOT NULL REFERENCES entity_tree(id),
    alias_id INTEGER NOT NULL REFERENCES alias(id),
    PRIMARY KEY (entity_tree_id, alias_id)
);

-- Revisions
CREATE TABLE IF NOT EXISTS revision (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES "user"(id),
    created_at TEXT NOT NULL,
    type INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS entity_revision (
    id INTEGER PRIMARY KEY REFERENCES revision(id),
    entity_gid TEXT NOT NULL REFERENCES entity(gid),
    entity_tree_id INTEGER NOT NULL REFERENCES entity_tree(id)
);

CREATE INDEX IF NOT EXISTS idx_entity_revision_gid ON entity_revision(entity_gid);

-- Relationships
CREATE TABLE IF NOT EXISTS rel (
    id INTEGER PRIMARY KEY,
    last_updated TEXT NOT NULL,
    master_revision_id INTEGER REFERENCES rel_revision(id)
);

CREATE TABLE IF NOT EXISTS rel_tree (
    id INTEGER PRIMARY KEY,
    relationship_type TEXT NOT NULL,
    source_gid TEXT NOT NULL REFERENCES entity(gid),
    target_gid TEXT NOT NULL REFERENCES entity(gid)
);

CREATE INDEX IF NOT EXISTS idx_rel_tree_source ON rel_tree(source_gid);
CREATE INDEX IF NOT EXISTS idx_rel_tree_target ON rel_tree(target_gid);

CREATE TABLE IF NOT EXISTS rel_revision (
    id INTEGER PRIMARY KEY REFERENCES revision(id),
    relationship_id INTEGER NOT NULL REFERENCES rel(id),
    relationship_tree_id INTEGER NOT NULL REFERENCES rel_tree(id)
);

-- Edits
CREATE TABLE IF NOT EXISTS edit (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES "user"(id),
    status INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_edit_status ON edit(status);

CREATE TABLE IF NOT EXISTS edit_revision (
    edit_id INTEGER NOT NULL REFERENCES edit(id),
    revision_id INTEGER NOT NULL REFERENCES revision(id),
    PRIMARY KEY (edit_id, revision_id)
);

CREATE INDEX IF NOT EXISTS idx_edit_revision_revision ON edit_revision(revision_id);

CREATE TABLE IF NOT EXISTS edit_note (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES "user"(id),
    edit_id INTEGER NOT NULL REFERENCES edit(id),
    content TEXT NOT NULL,
    posted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_edit_note_edit ON edit_note(edit_id);

-- FTS5 over alias names
CREATE VIRTUAL TABLE IF NOT EXISTS alias_fts USING fts5(
    name,
    sort_name,
    content='alias',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS alias_ai AFTER INSERT ON alias BEGIN
    INSERT INTO alias_fts(rowid, name, sort_name)
    VALUES (new.id, new.name, new.sort_name);
END;
"#;
