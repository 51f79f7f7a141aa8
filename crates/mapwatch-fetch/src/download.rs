//! Streaming a response body to disk.
//!
//! The body goes to `<dest>.part` first and is renamed onto `dest` only once
//! every chunk has been written, so a failed transfer never leaves a file at
//! the final path.

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt as _};

use crate::{error::DownloadError, http::BodyStream};

/// Extension given to every downloaded map.
pub const MAP_EXTENSION: &str = "jpg";

/// `{country_id}_{YYYYMMDD}.jpg`
pub fn map_file_name(country_id: &str, published_at: DateTime<Utc>) -> String {
  format!("{country_id}_{}.{MAP_EXTENSION}", published_at.format("%Y%m%d"))
}

/// Directory for one run's downloads, named after the run's start date
/// (`DD_MM_YY`).
pub fn run_directory(root: &Path, started_on: NaiveDate) -> PathBuf {
  root.join(started_on.format("%d_%m_%y").to_string())
}

/// What was written by [`save_body`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
  pub bytes:        u64,
  /// Hex-encoded SHA-256 of the body.
  pub content_hash: String,
}

fn part_path(dest: &Path) -> PathBuf {
  let mut name = OsString::from(dest.as_os_str());
  name.push(".part");
  PathBuf::from(name)
}

/// Stream `body` into `dest`. An existing file at `dest` is never replaced.
pub async fn save_body(mut body: BodyStream, dest: &Path) -> Result<SavedFile, DownloadError> {
  if fs::try_exists(dest).await.map_err(DownloadError::io(dest))? {
    return Err(DownloadError::Exists(dest.to_path_buf()));
  }

  let part = part_path(dest);
  let result = match write_part(&mut body, &part).await {
    Ok(saved) => fs::rename(&part, dest)
      .await
      .map(|()| saved)
      .map_err(DownloadError::io(dest)),
    Err(e) => Err(e),
  };

  if result.is_err() {
    discard(&part).await;
  }
  result
}

async fn write_part(body: &mut BodyStream, part: &Path) -> Result<SavedFile, DownloadError> {
  let mut file = fs::File::create(part).await.map_err(DownloadError::io(part))?;
  let mut hasher = Sha256::new();
  let mut bytes = 0u64;

  while let Some(chunk) = body.chunk().await? {
    hasher.update(&chunk);
    file.write_all(&chunk).await.map_err(DownloadError::io(part))?;
    bytes += chunk.len() as u64;
  }
  file.flush().await.map_err(DownloadError::io(part))?;

  Ok(SavedFile { bytes, content_hash: hex::encode(hasher.finalize()) })
}

/// Best-effort removal of a file left behind by a failed step.
pub(crate) async fn discard(path: &Path) {
  match fs::remove_file(path).await {
    Ok(()) => {}
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove file"),
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use chrono::TimeZone;
  use url::Url;
  use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
  };

  use super::*;
  use crate::{
    http::{HttpClient, HttpSettings},
    retry::{Backoff, RetryPolicy},
  };

  #[test]
  fn file_name_uses_country_and_compact_date() {
    let date = Utc.with_ymd_and_hms(2021, 3, 5, 0, 0, 0).unwrap();
    assert_eq!(map_file_name("chili", date), "chili_20210305.jpg");
  }

  #[test]
  fn run_directory_is_named_after_start_date() {
    let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert_eq!(run_directory(Path::new("maps"), day), Path::new("maps/19_10_26"));
  }

  async fn body_from(server: &MockServer, bytes: Vec<u8>) -> BodyStream {
    Mock::given(method("GET"))
      .and(path("/map.jpg"))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
      .mount(server)
      .await;
    let client = HttpClient::new(&HttpSettings {
      user_agent:      "mapwatch-test/1.0".into(),
      max_connections: 2,
      timeout:         Duration::from_secs(5),
      retry:           RetryPolicy { max_attempts: 1, backoff: Backoff::Fixed(Duration::ZERO) },
    })
    .unwrap();
    let url = Url::parse(&format!("{}/map.jpg", server.uri())).unwrap();
    client.get_stream(&url).await.unwrap()
  }

  #[tokio::test]
  async fn saves_body_and_hashes_it() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("chili_20210315.jpg");

    let saved = save_body(body_from(&server, b"not really a jpeg".to_vec()).await, &dest)
      .await
      .unwrap();

    assert_eq!(saved.bytes, 17);
    assert_eq!(saved.content_hash, hex::encode(Sha256::digest(b"not really a jpeg")));
    assert_eq!(std::fs::read(&dest).unwrap(), b"not really a jpeg");
    assert!(!part_path(&dest).exists());
  }

  #[tokio::test]
  async fn existing_file_is_not_overwritten() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("chili_20210315.jpg");
    std::fs::write(&dest, b"previous").unwrap();

    let err = save_body(body_from(&server, b"new".to_vec()).await, &dest)
      .await
      .unwrap_err();

    assert!(matches!(err, DownloadError::Exists(_)));
    assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
  }

  #[tokio::test]
  async fn unwritable_destination_leaves_nothing_behind() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing-dir").join("chili_20210315.jpg");

    let err = save_body(body_from(&server, b"bytes".to_vec()).await, &dest)
      .await
      .unwrap_err();

    assert!(matches!(err, DownloadError::Io { .. }));
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
  }
}
