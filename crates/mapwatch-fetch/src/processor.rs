//! The per-country pipeline: fetch → extract → dedupe → claim → download →
//! finalize.
//!
//! A claim is written before the download starts so that two countries
//! racing for the same URL cannot both record it. If the download then fails
//! the claim stays dangling; it is picked up by the repair sweep of the next
//! run, never retried within the current one.

use std::path::{Path, PathBuf};

use mapwatch_core::{
  country::Country,
  map::{ClaimOutcome, MapDownload, MapRecord},
  store::MapStore,
};
use url::Url;

use crate::{
  date::{self, DateSource},
  download::{self, SavedFile, map_file_name, save_body},
  error::{DownloadError, HttpError, ProcessError},
  extract::{find_map_url, resolve_map_url},
  http::HttpClient,
};

/// A map that was downloaded and recorded.
#[derive(Debug, Clone)]
pub struct Downloaded {
  pub record:      MapRecord,
  pub date_source: DateSource,
  pub bytes:       u64,
}

/// Runs the pipeline for one country at a time. Cheap to clone; clones share
/// the store and the HTTP connection pool.
#[derive(Clone)]
pub struct CountryProcessor<S> {
  store:        S,
  http:         HttpClient,
  site_url:     Url,
  download_dir: PathBuf,
}

impl<S> CountryProcessor<S>
where
  S: MapStore + Clone + 'static,
{
  /// `site_url` resolves relative page and image URLs; downloads land in
  /// `download_dir`, which must already exist.
  pub fn new(store: S, http: HttpClient, site_url: Url, download_dir: PathBuf) -> Self {
    Self { store, http, site_url, download_dir }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Look for a new map for `country` and download it.
  pub async fn process(&self, country: &Country) -> Result<Downloaded, ProcessError> {
    let page_url = self.site_url.join(&country.url).map_err(|source| {
      ProcessError::Fetch(HttpError::InvalidUrl { url: country.url.clone(), source })
    })?;
    tracing::debug!(country = %country.country_id, url = %page_url, "fetching advisory page");
    let page = self.http.get_text(&page_url).await.map_err(ProcessError::Fetch)?;

    let map_url = find_map_url(&page).ok_or(ProcessError::ExtractionMiss)?;

    if let Some(existing) = self
      .store
      .find_map(&country.country_id, &map_url)
      .await
      .map_err(ProcessError::store)?
    {
      return Err(ProcessError::DuplicateMap {
        url:      map_url,
        dangling: existing.is_dangling(),
      });
    }

    match self
      .store
      .create_map_claim(&country.country_id, &map_url)
      .await
      .map_err(ProcessError::store)?
    {
      ClaimOutcome::Claimed(record) => self.complete_download(record).await,
      ClaimOutcome::UrlTaken => Err(ProcessError::ClaimConflict {
        owner: self.owner_name(&map_url).await?,
        url:   map_url,
      }),
    }
  }

  /// Download the map for an existing claim and attach the result to it.
  ///
  /// On failure the claim is left untouched (dangling).
  pub async fn complete_download(&self, record: MapRecord) -> Result<Downloaded, ProcessError> {
    let map_id = record.map_id;
    let Some(map_url) = record.url.as_deref().filter(|u| !u.is_empty()) else {
      return Err(ProcessError::EmptyClaim { map_id });
    };

    let inferred = date::infer_date(map_url);
    if inferred.is_fallback() {
      tracing::warn!(
        country = %record.country_id,
        filename = date::file_name(map_url),
        "can't find date in map file name, using today's date"
      );
    }

    let file_name = map_file_name(&record.country_id, inferred.published_at);
    let dest = self.download_dir.join(&file_name);
    tracing::info!(country = %record.country_id, "downloading map as {file_name}");

    let source = resolve_map_url(&self.site_url, map_url).map_err(|source| {
      ProcessError::Download {
        map_id,
        source: DownloadError::Http(HttpError::InvalidUrl { url: map_url.to_owned(), source }),
      }
    })?;
    let saved = self.fetch_to(&source, &dest).await.map_err(|source| {
      if let DownloadError::Exists(path) = &source {
        // Two maps of one country dated the same day share a file name.
        tracing::warn!(
          country = %record.country_id,
          path = %path.display(),
          date_source = ?inferred.source,
          "map file name already taken by an earlier download, claim left dangling"
        );
      }
      ProcessError::Download { map_id, source }
    })?;

    let finalized = self
      .store
      .update_map(map_id, MapDownload {
        path:         dest.to_string_lossy().into_owned(),
        published_at: inferred.published_at,
        content_hash: Some(saved.content_hash),
      })
      .await;

    match finalized {
      Ok(record) => Ok(Downloaded { record, date_source: inferred.source, bytes: saved.bytes }),
      Err(e) => {
        // The file is not referenced by any record; don't leave it around.
        download::discard(&dest).await;
        Err(ProcessError::store(e))
      }
    }
  }

  async fn fetch_to(&self, source: &Url, dest: &Path) -> Result<SavedFile, DownloadError> {
    let body = self.http.get_stream(source).await?;
    save_body(body, dest).await
  }

  async fn owner_name(&self, map_url: &str) -> Result<Option<String>, ProcessError> {
    let Some(owner) = self
      .store
      .find_map_by_url(map_url)
      .await
      .map_err(ProcessError::store)?
    else {
      return Ok(None);
    };
    let country = self
      .store
      .get_country(&owner.country_id)
      .await
      .map_err(ProcessError::store)?;
    Ok(Some(country.map_or(owner.country_id, |c| c.name)))
  }
}

/// Log the outcome of one country's pipeline at the appropriate level.
pub fn log_outcome(country_id: &str, result: &Result<Downloaded, ProcessError>) {
  match result {
    Ok(done) => tracing::info!(
      country = country_id,
      path = done.record.path.as_deref().unwrap_or_default(),
      bytes = done.bytes,
      "map downloaded"
    ),
    Err(ProcessError::ExtractionMiss) => {
      tracing::info!(country = country_id, "can't find map URL")
    }
    Err(ProcessError::DuplicateMap { url, dangling: false }) => {
      tracing::info!(country = country_id, url = %url, "no new map")
    }
    Err(ProcessError::DuplicateMap { url, dangling: true }) => tracing::warn!(
      country = country_id,
      url = %url,
      "no new map; the recorded claim was never downloaded"
    ),
    Err(e @ ProcessError::ClaimConflict { .. }) => {
      tracing::warn!(country = country_id, "{e}")
    }
    Err(e) => tracing::error!(country = country_id, error = %e, kind = %e.kind(), "country failed"),
  }
}
