//! A country is one advisory page on the source site.
//!
//! Countries are created once by the bootstrap and never mutated afterwards.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
  /// Stable slug taken from the advisory page URL, e.g. `afghanistan`.
  pub country_id: String,
  pub name:       String,
  /// Advisory page URL, absolute or relative to the site root.
  pub url:        String,
}

impl Country {
  pub fn new(
    country_id: impl Into<String>,
    name: impl Into<String>,
    url: impl Into<String>,
  ) -> Self {
    Self {
      country_id: country_id.into(),
      name:       name.into(),
      url:        url.into(),
    }
  }
}
