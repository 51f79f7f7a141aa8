//! The `MapStore` trait.
//!
//! Implemented by storage backends (e.g. `mapwatch-store-sqlite`). The fetch
//! pipeline depends on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  country::Country,
  map::{ClaimOutcome, MapDownload, MapRecord},
};

/// Abstraction over the record store holding countries and their maps.
///
/// Each call is atomic at the single-row level. The global uniqueness of a
/// map's source URL is the only mechanism that keeps two concurrent claims
/// for the same URL from both succeeding.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks.
pub trait MapStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Countries ─────────────────────────────────────────────────────────

  /// Persist a new country. Fails if the id is already taken.
  fn create_country(
    &self,
    country: Country,
  ) -> impl Future<Output = Result<Country, Self::Error>> + Send + '_;

  /// Persist several countries at once. Either all of them are stored or
  /// none is; a taken id fails the whole batch.
  fn create_countries(
    &self,
    countries: Vec<Country>,
  ) -> impl Future<Output = Result<Vec<Country>, Self::Error>> + Send + '_;

  /// Retrieve a country by id. Returns `None` if not found.
  fn get_country<'a>(
    &'a self,
    country_id: &'a str,
  ) -> impl Future<Output = Result<Option<Country>, Self::Error>> + Send + 'a;

  fn count_countries(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// List all countries ordered by id.
  fn list_countries(
    &self,
  ) -> impl Future<Output = Result<Vec<Country>, Self::Error>> + Send + '_;

  // ── Maps ──────────────────────────────────────────────────────────────

  /// Claim `url` for `country_id` by writing a record with no download
  /// metadata.
  ///
  /// Returns [`ClaimOutcome::UrlTaken`] when any record (for any country)
  /// already holds the URL.
  fn create_map_claim<'a>(
    &'a self,
    country_id: &'a str,
    url: &'a str,
  ) -> impl Future<Output = Result<ClaimOutcome, Self::Error>> + Send + 'a;

  /// Find the record for this exact (country, url) pair.
  fn find_map<'a>(
    &'a self,
    country_id: &'a str,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<MapRecord>, Self::Error>> + Send + 'a;

  /// Find the record holding `url`, whichever country owns it.
  fn find_map_by_url<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<MapRecord>, Self::Error>> + Send + 'a;

  /// Attach download metadata to an existing claim.
  ///
  /// Fails if the record does not exist or another record already uses the
  /// same local path.
  fn update_map(
    &self,
    map_id: Uuid,
    download: MapDownload,
  ) -> impl Future<Output = Result<MapRecord, Self::Error>> + Send + '_;

  /// All claims whose download phase never completed.
  fn list_dangling_maps(
    &self,
  ) -> impl Future<Output = Result<Vec<MapRecord>, Self::Error>> + Send + '_;
}
