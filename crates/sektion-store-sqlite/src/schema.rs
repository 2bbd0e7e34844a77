//! SQL schema for the membership store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS groups (
    group_id          TEXT PRIMARY KEY,
    layer_id          TEXT NOT NULL,   -- the owning section
    name              TEXT NOT NULL,
    requires_approval INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS people (
    person_id          TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    birthday           TEXT,            -- YYYY-MM-DD
    household_key      TEXT,
    main_person        INTEGER NOT NULL DEFAULT 0,
    newsletter_opt_in  INTEGER NOT NULL DEFAULT 0,
    fundraising_opt_in INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL
);

-- Ended roles are kept; deleted_at marks soft deletion.
CREATE TABLE IF NOT EXISTS roles (
    role_id            TEXT PRIMARY KEY,
    person_id          TEXT NOT NULL REFERENCES people(person_id),
    group_id           TEXT NOT NULL REFERENCES groups(group_id),
    layer_id           TEXT NOT NULL,
    kind               TEXT NOT NULL,
    category           TEXT,
    start_on           TEXT,            -- YYYY-MM-DD, inclusive
    end_on             TEXT,            -- YYYY-MM-DD, inclusive
    terminated         INTEGER NOT NULL DEFAULT 0,
    termination_reason TEXT,
    mutation_id        TEXT,
    deleted_at         TEXT,
    created_at         TEXT NOT NULL
);

-- Previous role state per termination, restored by undo.
CREATE TABLE IF NOT EXISTS terminations (
    entry_id            TEXT PRIMARY KEY,
    mutation_id         TEXT NOT NULL,
    role_id             TEXT NOT NULL REFERENCES roles(role_id),
    previous_end_on     TEXT,
    previous_terminated INTEGER NOT NULL,
    previous_deleted_at TEXT,
    previous_reason     TEXT,
    recorded_at         TEXT NOT NULL,
    undone_at           TEXT
);

CREATE INDEX IF NOT EXISTS people_household_idx      ON people(household_key);
CREATE INDEX IF NOT EXISTS roles_person_idx          ON roles(person_id);
CREATE INDEX IF NOT EXISTS roles_mutation_idx        ON roles(mutation_id);
CREATE INDEX IF NOT EXISTS terminations_mutation_idx ON terminations(mutation_id);
CREATE INDEX IF NOT EXISTS terminations_role_idx     ON terminations(role_id);

PRAGMA user_version = 1;
";
