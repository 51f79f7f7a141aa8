//! Map records and the two-phase claim lifecycle.
//!
//! A record is first written as a *claim* holding only the owning country and
//! the source URL. The download metadata is attached afterwards. A claim whose
//! download never completed is *dangling*.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A map image recorded for a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
  pub map_id:       Uuid,
  pub country_id:   String,
  /// Normalized source URL (network location + path). Globally unique.
  pub url:          Option<String>,
  /// Local file path. Unique once set.
  pub path:         Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  /// Hex-encoded SHA-256 of the downloaded body.
  pub content_hash: Option<String>,
  pub claimed_at:   DateTime<Utc>,
}

impl MapRecord {
  /// `true` while the download phase has not been recorded.
  pub fn is_dangling(&self) -> bool { self.path.is_none() }
}

/// Metadata attached to a claim after a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDownload {
  pub path:         String,
  pub published_at: DateTime<Utc>,
  pub content_hash: Option<String>,
}

/// Result of trying to claim a source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
  /// The claim row was written; the URL now belongs to this record.
  Claimed(MapRecord),
  /// Another record already owns this URL.
  UrlTaken,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn claim_without_path_is_dangling() {
    let mut record = MapRecord {
      map_id:       Uuid::new_v4(),
      country_id:   "chili".into(),
      url:          Some("IMG/jpg/chili.jpg".into()),
      path:         None,
      published_at: None,
      content_hash: None,
      claimed_at:   Utc::now(),
    };
    assert!(record.is_dangling());

    record.path = Some("19_10_26/chili_20261019.jpg".into());
    assert!(!record.is_dangling());
  }
}
