//! Runtime configuration, read from an optional TOML file layered under
//! `MAPWATCH_*` environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
  http::{DEFAULT_MAX_CONNECTIONS, HttpSettings},
  retry::{Backoff, RetryPolicy},
};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to load configuration: {0}")]
  Load(#[from] ::config::ConfigError),

  #[error("invalid {field} {value:?}: {source}")]
  InvalidUrl {
    field:  &'static str,
    value:  String,
    #[source]
    source: url::ParseError,
  },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  pub store_path:           PathBuf,
  /// Site root; relative page and image URLs are resolved against it.
  pub site_url:             String,
  /// Page listing every destination, read when the store has no countries.
  pub directory_url:        String,
  /// Each run downloads into a `DD_MM_YY` directory below this one.
  pub download_root:        PathBuf,
  pub user_agent:           String,
  pub max_connections:      usize,
  pub max_attempts:         u32,
  pub retry_delay_ms:       u64,
  pub request_timeout_secs: u64,
  pub log_file:             Option<PathBuf>,
  pub repair_dangling:      bool,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      store_path:           PathBuf::from("maps.db"),
      site_url:             "https://www.diplomatie.gouv.fr/".into(),
      directory_url:        "https://www.diplomatie.gouv.fr/fr/conseils-aux-voyageurs/conseils-par-pays-destination/".into(),
      download_root:        PathBuf::from("."),
      user_agent:           "Mozilla/5.0 (X11; Linux x86_64; rv:68.0) Gecko/20100101 Firefox/68.0".into(),
      max_connections:      DEFAULT_MAX_CONNECTIONS,
      max_attempts:         3,
      retry_delay_ms:       1000,
      request_timeout_secs: 60,
      log_file:             Some(PathBuf::from("mapwatch.log")),
      repair_dangling:      true,
    }
  }
}

impl FetchConfig {
  /// Read `path` (if it exists) and then `MAPWATCH_*` variables on top.
  pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
    let settings = ::config::Config::builder()
      .add_source(::config::File::from(path).required(false))
      .add_source(::config::Environment::with_prefix("MAPWATCH").try_parsing(true))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn site_url(&self) -> Result<Url, ConfigError> { parse_url("site_url", &self.site_url) }

  pub fn directory_url(&self) -> Result<Url, ConfigError> {
    parse_url("directory_url", &self.directory_url)
  }

  pub fn http_settings(&self) -> HttpSettings {
    HttpSettings {
      user_agent:      self.user_agent.clone(),
      max_connections: self.max_connections,
      timeout:         Duration::from_secs(self.request_timeout_secs),
      retry:           RetryPolicy {
        max_attempts: self.max_attempts,
        backoff:      Backoff::Fixed(Duration::from_millis(self.retry_delay_ms)),
      },
    }
  }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
  Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
    field,
    value: value.to_owned(),
    source,
  })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = FetchConfig::load(dir.path().join("absent.toml")).unwrap();

    assert_eq!(cfg.max_connections, 100);
    assert_eq!(cfg.max_attempts, 3);
    assert!(cfg.repair_dangling);
    assert_eq!(cfg.site_url().unwrap().host_str(), Some("www.diplomatie.gouv.fr"));
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mapwatch.toml");
    std::fs::write(
      &file,
      "store_path = \"/var/lib/mapwatch/maps.db\"\nmax_connections = 8\nrepair_dangling = false\n",
    )
    .unwrap();

    let cfg = FetchConfig::load(file).unwrap();

    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/mapwatch/maps.db"));
    assert_eq!(cfg.max_connections, 8);
    assert!(!cfg.repair_dangling);
    assert_eq!(cfg.max_attempts, 3);
  }

  #[test]
  fn http_settings_follow_config() {
    let cfg = FetchConfig { retry_delay_ms: 250, max_attempts: 5, ..FetchConfig::default() };
    let settings = cfg.http_settings();
    assert_eq!(settings.retry.max_attempts, 5);
    assert_eq!(settings.retry.backoff, Backoff::Fixed(Duration::from_millis(250)));
  }

  #[test]
  fn bad_site_url_is_reported() {
    let cfg = FetchConfig { site_url: "not a url".into(), ..FetchConfig::default() };
    assert!(matches!(
      cfg.site_url(),
      Err(ConfigError::InvalidUrl { field: "site_url", .. })
    ));
  }

  #[test]
  fn tilde_expands_to_home() {
    let home = std::env::var("HOME").unwrap_or_default();
    if home.is_empty() {
      return;
    }
    assert_eq!(expand_tilde(Path::new("~/maps.db")), PathBuf::from(home).join("maps.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/maps.db")), PathBuf::from("/tmp/maps.db"));
  }
}
