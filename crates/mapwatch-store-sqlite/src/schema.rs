//! SQL schema for the mapwatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS countries (
    country_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    url         TEXT NOT NULL
);

-- A row is written first as a claim (country + url only); path, date and
-- hash are filled in once the download succeeds.
CREATE TABLE IF NOT EXISTS maps (
    map_id        TEXT PRIMARY KEY,
    country_id    TEXT NOT NULL REFERENCES countries(country_id),
    url           TEXT UNIQUE,
    path          TEXT UNIQUE,
    published_at  TEXT,            -- ISO 8601 UTC
    content_hash  TEXT,            -- hex SHA-256
    claimed_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS maps_url_idx     ON maps(url);
CREATE INDEX IF NOT EXISTS maps_country_idx ON maps(country_id);

PRAGMA user_version = 1;
";
