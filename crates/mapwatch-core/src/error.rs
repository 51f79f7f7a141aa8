//! Error types for `mapwatch-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("map record not found: {0}")]
  MapNotFound(Uuid),

  #[error("country {0:?} already exists")]
  DuplicateCountry(String),

  #[error("local path {0:?} is already used by another map")]
  PathTaken(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
