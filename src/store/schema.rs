//! Database schema and migrations for Warden.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Initial schema - logs, members, punishments, shifts
    r#"
-- Ingested upstream log entries. The upstream provides no log ids, so
-- (server_id, kind, prc_timestamp) is the identity of a record.
CREATE TABLE logs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id     TEXT NOT NULL,
    kind          TEXT NOT NULL,      -- 'join', 'kill', 'command'
    prc_timestamp INTEGER NOT NULL,   -- upstream epoch seconds
    details       TEXT NOT NULL,      -- JSON payload per kind
    created_at    INTEGER NOT NULL,   -- epoch milliseconds
    UNIQUE(server_id, kind, prc_timestamp)
);

CREATE INDEX idx_logs_server_kind ON logs(server_id, kind);
CREATE INDEX idx_logs_prc_timestamp ON logs(prc_timestamp);

-- Registered staff members, scoped per server
CREATE TABLE members (
    user_id       INTEGER NOT NULL,   -- Roblox id
    server_id     TEXT NOT NULL,
    username      TEXT NOT NULL,
    role          TEXT NOT NULL,
    discord_id    TEXT,
    quota_minutes INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (server_id, user_id)
);

-- Punishments issued via game commands
CREATE TABLE punishments (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id    TEXT NOT NULL,
    user_id      INTEGER NOT NULL,    -- target Roblox id
    user_name    TEXT NOT NULL,
    moderator_id INTEGER NOT NULL,    -- issuer Roblox id
    kind         TEXT NOT NULL,       -- 'Warn', 'Kick', 'Ban', 'Ban Bolo'
    reason       TEXT NOT NULL,
    resolved     INTEGER NOT NULL DEFAULT 1,
    created_at   INTEGER NOT NULL     -- epoch milliseconds
);

CREATE INDEX idx_punishments_server_user ON punishments(server_id, user_id);

-- Staff duty shifts. end_time IS NULL marks an active shift.
CREATE TABLE shifts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id     TEXT NOT NULL,
    user_id       INTEGER NOT NULL,
    start_time    INTEGER NOT NULL,   -- epoch milliseconds
    end_time      INTEGER,
    duration_secs INTEGER
);

CREATE INDEX idx_shifts_server_user ON shifts(server_id, user_id);
CREATE INDEX idx_shifts_active ON shifts(server_id) WHERE end_time IS NULL;
"#,
    // v2: Shutdown event descriptors for later display
    r#"
CREATE TABLE shutdown_events (
    id                TEXT PRIMARY KEY,
    server_id         TEXT NOT NULL,
    timestamp         INTEGER NOT NULL,  -- epoch milliseconds
    initiator_id      INTEGER NOT NULL,
    initiator_name    TEXT NOT NULL,
    shifts_ended      INTEGER NOT NULL,
    affected_user_ids TEXT NOT NULL      -- JSON array of Roblox ids
);

CREATE INDEX idx_shutdown_events_server ON shutdown_events(server_id);
"#,
];
