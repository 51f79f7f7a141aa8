//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings.

use chrono::{DateTime, Utc};
use mapwatch_core::{country::Country, map::MapRecord};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Constraint errors ────────────────────────────────────────────────────────

/// `true` if `err` is a violated `UNIQUE` (or primary key) constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

// ─── Raw row types ────────────────────────────────────────────────────────────

pub const COUNTRY_COLUMNS: &str = "country_id, name, url";

pub fn country_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Country> {
  Ok(Country {
    country_id: row.get(0)?,
    name:       row.get(1)?,
    url:        row.get(2)?,
  })
}

pub const MAP_COLUMNS: &str =
  "map_id, country_id, url, path, published_at, content_hash, claimed_at";

/// A `maps` row exactly as read from SQLite, before decoding.
pub struct RawMap {
  pub map_id:       String,
  pub country_id:   String,
  pub url:          Option<String>,
  pub path:         Option<String>,
  pub published_at: Option<String>,
  pub content_hash: Option<String>,
  pub claimed_at:   String,
}

impl RawMap {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      map_id:       row.get(0)?,
      country_id:   row.get(1)?,
      url:          row.get(2)?,
      path:         row.get(3)?,
      published_at: row.get(4)?,
      content_hash: row.get(5)?,
      claimed_at:   row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<MapRecord> {
    Ok(MapRecord {
      map_id:       decode_uuid(&self.map_id)?,
      country_id:   self.country_id,
      url:          self.url,
      path:         self.path,
      published_at: self.published_at.as_deref().map(decode_dt).transpose()?,
      content_hash: self.content_hash,
      claimed_at:   decode_dt(&self.claimed_at)?,
    })
  }
}
