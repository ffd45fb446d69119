//! Canonical SQLite schema for the ticket store.
//!
//! - `tickets` keeps the scalar aggregate fields, one row per ticket
//! - `ticket_comments` and `ticket_history` hold the embedded sequences,
//!   ordered by `position` / `seq`
//! - `accounts`, `groups`, `group_members`, `ticket_types` hold referenced
//!   records used for expansion
//! - `counters` backs the display-number allocator
//! - `store_meta` tracks the schema version

/// Migration v1: core tables, counter seed, and store metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    account_id TEXT PRIMARY KEY,
    username TEXT NOT NULL CHECK (length(trim(username)) > 0),
    full_name TEXT,
    email TEXT
);

CREATE TABLE IF NOT EXISTS groups (
    group_id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
    account_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (group_id, account_id)
);

CREATE TABLE IF NOT EXISTS ticket_types (
    type_id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tickets (
    ticket_id TEXT PRIMARY KEY,
    display_number INTEGER NOT NULL UNIQUE CHECK (display_number > 0),
    owner_id TEXT NOT NULL,
    group_id TEXT NOT NULL,
    assignee_id TEXT,
    type_id TEXT NOT NULL,
    status INTEGER NOT NULL CHECK (status IN (0, 1, 2, 3)),
    priority INTEGER NOT NULL,
    subject TEXT NOT NULL,
    issue TEXT NOT NULL,
    tags_json TEXT NOT NULL DEFAULT '[]',
    closed_at_us INTEGER,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER,
    is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
    version INTEGER NOT NULL DEFAULT 1 CHECK (version > 0),
    CHECK (ticket_id LIKE 'tk-%')
);

CREATE TABLE IF NOT EXISTS ticket_comments (
    ticket_id TEXT NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    comment_id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (ticket_id, position)
);

CREATE TABLE IF NOT EXISTS ticket_history (
    ticket_id TEXT NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    action TEXT NOT NULL CHECK (action LIKE 'ticket:%'),
    description TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (ticket_id, seq)
);

CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    next INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO counters (name, next) VALUES ('tickets', 0);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, CAST(strftime('%s', 'now') AS INTEGER) * 1000000);
"#;

/// Migration v2: read-path indexes for scoped listing and date-window counts.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tickets_group_status
    ON tickets(is_deleted, group_id, status);

CREATE INDEX IF NOT EXISTS idx_tickets_assignee_status
    ON tickets(assignee_id, status);

CREATE INDEX IF NOT EXISTS idx_tickets_created
    ON tickets(is_deleted, created_at_us);

CREATE INDEX IF NOT EXISTS idx_tickets_closed
    ON tickets(is_deleted, closed_at_us);

CREATE INDEX IF NOT EXISTS idx_group_members_group
    ON group_members(group_id, position);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
"#;

/// Indexes expected by list/count query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tickets_group_status",
    "idx_tickets_assignee_status",
    "idx_tickets_created",
    "idx_tickets_closed",
    "idx_group_members_group",
];
