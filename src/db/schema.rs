//! Database schema and migrations for CloudVault.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Drive contents - folders and files
    r#"
-- Folders form a tree per user; size is the sum of all files beneath
CREATE TABLE folders (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    size        INTEGER NOT NULL DEFAULT 0,
    parent_id   TEXT REFERENCES folders(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folders_parent_id ON folders(parent_id);
CREATE INDEX idx_folders_user_id ON folders(user_id);

-- Files whose bytes reached the object store
CREATE TABLE files (
    id          TEXT PRIMARY KEY,
    key         TEXT NOT NULL UNIQUE,    -- object key in the bucket
    name        TEXT NOT NULL,
    size        INTEGER NOT NULL,
    folder_id   TEXT REFERENCES folders(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_files_folder_id ON files(folder_id);
CREATE INDEX idx_files_user_id ON files(user_id);
"#,
    // v2: Storage quota per user
    r#"
CREATE TABLE storage (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        TEXT NOT NULL UNIQUE,
    total_storage  INTEGER NOT NULL DEFAULT 1073741824,  -- 1 GiB
    used_storage   INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v3: Uploads authorized but not yet confirmed by the object store
    r#"
CREATE TABLE pending_uploads (
    key         TEXT PRIMARY KEY,
    file_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    size        INTEGER NOT NULL,        -- declared size
    folder_id   TEXT,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_pending_uploads_user_id ON pending_uploads(user_id);
"#,
    // v4: Bearer session tokens for the drive API
    r#"
CREATE TABLE sessions (
    token       TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_sessions_user_id ON sessions(user_id);
"#,
];
