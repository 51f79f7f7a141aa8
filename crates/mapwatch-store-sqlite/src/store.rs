//! [`SqliteStore`], the SQLite implementation of [`MapStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use mapwatch_core::{
  country::Country,
  map::{ClaimOutcome, MapDownload, MapRecord},
  store::MapStore,
};

use crate::{
  encode::{
    COUNTRY_COLUMNS, MAP_COLUMNS, RawMap, country_from_row, encode_dt, encode_uuid,
    is_unique_violation,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A mapwatch record store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. All clones
/// share one connection, so statements are serialized.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read a single map row by id.
  async fn get_map(&self, map_id: Uuid) -> Result<Option<MapRecord>> {
    let id_str = encode_uuid(map_id);

    let raw: Option<RawMap> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MAP_COLUMNS} FROM maps WHERE map_id = ?1"),
            rusqlite::params![id_str],
            RawMap::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMap::into_record).transpose()
  }
}

// ─── MapStore impl ───────────────────────────────────────────────────────────

impl MapStore for SqliteStore {
  type Error = Error;

  // ── Countries ─────────────────────────────────────────────────────────────

  async fn create_country(&self, country: Country) -> Result<Country> {
    let id   = country.country_id.clone();
    let name = country.name.clone();
    let url  = country.url.clone();

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO countries (country_id, name, url) VALUES (?1, ?2, ?3)",
          rusqlite::params![id, name, url],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(mapwatch_core::Error::DuplicateCountry(country.country_id).into());
    }
    Ok(country)
  }

  async fn create_countries(&self, countries: Vec<Country>) -> Result<Vec<Country>> {
    let rows: Vec<(String, String, String)> = countries
      .iter()
      .map(|c| (c.country_id.clone(), c.name.clone(), c.url.clone()))
      .collect();

    // `Some(id)` names the first duplicate; the transaction is rolled back.
    let duplicate: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt =
            tx.prepare("INSERT INTO countries (country_id, name, url) VALUES (?1, ?2, ?3)")?;
          for (id, name, url) in &rows {
            match stmt.execute(rusqlite::params![id, name, url]) {
              Ok(_) => {}
              Err(e) if is_unique_violation(&e) => return Ok(Some(id.clone())),
              Err(e) => return Err(e.into()),
            }
          }
        }
        tx.commit()?;
        Ok(None)
      })
      .await?;

    if let Some(id) = duplicate {
      return Err(mapwatch_core::Error::DuplicateCountry(id).into());
    }
    Ok(countries)
  }

  async fn get_country(&self, country_id: &str) -> Result<Option<Country>> {
    let id = country_id.to_owned();

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row(
              &format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE country_id = ?1"),
              rusqlite::params![id],
              country_from_row,
            )
            .optional()?)
        })
        .await?,
    )
  }

  async fn count_countries(&self) -> Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM countries", [], |r| r.get(0))?)
      })
      .await?;
    Ok(count as usize)
  }

  async fn list_countries(&self) -> Result<Vec<Country>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare(&format!(
            "SELECT {COUNTRY_COLUMNS} FROM countries ORDER BY country_id"
          ))?;
          let rows = stmt
            .query_map([], country_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  // ── Maps ──────────────────────────────────────────────────────────────────

  async fn create_map_claim(&self, country_id: &str, url: &str) -> Result<ClaimOutcome> {
    let record = MapRecord {
      map_id:       Uuid::new_v4(),
      country_id:   country_id.to_owned(),
      url:          Some(url.to_owned()),
      path:         None,
      published_at: None,
      content_hash: None,
      claimed_at:   Utc::now(),
    };

    let id_str      = encode_uuid(record.map_id);
    let country_str = record.country_id.clone();
    let url_str     = url.to_owned();
    let at_str      = encode_dt(record.claimed_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO maps (map_id, country_id, url, claimed_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, country_str, url_str, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if inserted {
      Ok(ClaimOutcome::Claimed(record))
    } else {
      Ok(ClaimOutcome::UrlTaken)
    }
  }

  async fn find_map(&self, country_id: &str, url: &str) -> Result<Option<MapRecord>> {
    let country_str = country_id.to_owned();
    let url_str     = url.to_owned();

    let raw: Option<RawMap> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MAP_COLUMNS} FROM maps WHERE country_id = ?1 AND url = ?2"),
            rusqlite::params![country_str, url_str],
            RawMap::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMap::into_record).transpose()
  }

  async fn find_map_by_url(&self, url: &str) -> Result<Option<MapRecord>> {
    let url_str = url.to_owned();

    let raw: Option<RawMap> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MAP_COLUMNS} FROM maps WHERE url = ?1"),
            rusqlite::params![url_str],
            RawMap::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMap::into_record).transpose()
  }

  async fn update_map(&self, map_id: Uuid, download: MapDownload) -> Result<MapRecord> {
    let id_str   = encode_uuid(map_id);
    let path     = download.path.clone();
    let date_str = encode_dt(download.published_at);
    let hash     = download.content_hash.clone();

    // `None` signals a path collision.
    let updated: Option<usize> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "UPDATE maps SET path = ?2, published_at = ?3, content_hash = ?4
           WHERE map_id = ?1",
          rusqlite::params![id_str, path, date_str, hash],
        ) {
          Ok(n) => Ok(Some(n)),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match updated {
      None => Err(mapwatch_core::Error::PathTaken(download.path).into()),
      Some(0) => Err(mapwatch_core::Error::MapNotFound(map_id).into()),
      Some(_) => self
        .get_map(map_id)
        .await?
        .ok_or_else(|| mapwatch_core::Error::MapNotFound(map_id).into()),
    }
  }

  async fn list_dangling_maps(&self) -> Result<Vec<MapRecord>> {
    let raws: Vec<RawMap> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MAP_COLUMNS} FROM maps WHERE path IS NULL ORDER BY claimed_at"
        ))?;
        let rows = stmt
          .query_map([], RawMap::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMap::into_record).collect()
  }
}

