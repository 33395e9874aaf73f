//! Canonical SQLite schema for the openstreak store.
//!
//! - `readers` and `newsletters` map external identities to integer ids
//! - `streak_ledgers` holds exactly one ledger per reader
//! - `open_events` is the append-only log of processed (non-duplicate) opens
//! - `store_meta` tracks schema version and the last processed event

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS readers (
    reader_id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE CHECK (length(trim(email)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS newsletters (
    newsletter_id INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_id TEXT NOT NULL UNIQUE CHECK (length(trim(resource_id)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS streak_ledgers (
    reader_id INTEGER PRIMARY KEY REFERENCES readers(reader_id) ON DELETE CASCADE,
    current_streak INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
    longest_streak INTEGER NOT NULL DEFAULT 0 CHECK (longest_streak >= current_streak),
    last_opened_local_us INTEGER,
    life INTEGER NOT NULL DEFAULT 1,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS open_events (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    reader_id INTEGER NOT NULL REFERENCES readers(reader_id) ON DELETE CASCADE,
    newsletter_id INTEGER NOT NULL REFERENCES newsletters(newsletter_id) ON DELETE CASCADE,
    opened_at_us INTEGER NOT NULL,
    opened_on TEXT NOT NULL,
    utm_source TEXT,
    utm_medium TEXT,
    utm_campaign TEXT,
    utm_channel TEXT,
    fingerprint TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_event_id INTEGER NOT NULL DEFAULT 0,
    last_event_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (
    id,
    schema_version,
    last_event_id,
    last_event_at_us
) VALUES (1, 1, 0, 0);
"#;

/// Migration v2: read-path indexes for reporting queries.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_streak_ledgers_longest
    ON streak_ledgers(longest_streak DESC, reader_id);

CREATE INDEX IF NOT EXISTS idx_streak_ledgers_current
    ON streak_ledgers(current_streak, reader_id);

CREATE INDEX IF NOT EXISTS idx_open_events_reader_opened
    ON open_events(reader_id, opened_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_open_events_newsletter_day
    ON open_events(newsletter_id, opened_on);

CREATE INDEX IF NOT EXISTS idx_open_events_utm_source
    ON open_events(utm_source, utm_medium);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
"#;

/// Indexes expected by reporting query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_streak_ledgers_longest",
    "idx_streak_ledgers_current",
    "idx_open_events_reader_opened",
    "idx_open_events_newsletter_day",
    "idx_open_events_utm_source",
];
