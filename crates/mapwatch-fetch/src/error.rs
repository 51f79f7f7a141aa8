//! Error types for the fetch pipeline.
//!
//! Every failure a country can hit is a [`ProcessError`]. None of them abort
//! the run: the coordinator logs each one and counts it by [`ErrorKind`].

use std::{fmt, path::PathBuf};

use thiserror::Error;
use uuid::Uuid;

// ─── HTTP ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HttpError {
  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),

  #[error("invalid url {url:?}: {source}")]
  InvalidUrl {
    url:    String,
    #[source]
    source: url::ParseError,
  },

  #[error("GET {url} failed: {source}")]
  Request {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("GET {url} → {status}")]
  Status {
    url:    String,
    status: reqwest::StatusCode,
  },

  #[error("connection pool closed")]
  PoolClosed,
}

impl HttpError {
  /// Transport failures, throttling and server errors are worth another
  /// attempt. Client errors and malformed URLs are not.
  pub fn is_retryable(&self) -> bool {
    match self {
      HttpError::Request { source, .. } => !source.is_builder(),
      HttpError::Status { status, .. } => {
        *status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
      }
      HttpError::Build(_) | HttpError::InvalidUrl { .. } | HttpError::PoolClosed => false,
    }
  }
}

// ─── Download ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DownloadError {
  #[error(transparent)]
  Http(#[from] HttpError),

  #[error("{path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("refusing to overwrite existing file {0:?}")]
  Exists(PathBuf),
}

impl DownloadError {
  pub(crate) fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
    move |source| DownloadError::Io { path: path.to_path_buf(), source }
  }
}

// ─── Per-country pipeline ─────────────────────────────────────────────────────

/// Coarse classification of [`ProcessError`], used for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
  Fetch,
  ExtractionMiss,
  DuplicateMap,
  ClaimConflict,
  EmptyClaim,
  Download,
  Store,
}

impl ErrorKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::Fetch => "fetch_failure",
      ErrorKind::ExtractionMiss => "extraction_miss",
      ErrorKind::DuplicateMap => "duplicate_map",
      ErrorKind::ClaimConflict => "claim_conflict",
      ErrorKind::EmptyClaim => "empty_claim",
      ErrorKind::Download => "download_failure",
      ErrorKind::Store => "store_error",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("advisory page fetch failed: {0}")]
  Fetch(#[source] HttpError),

  #[error("no map URL found on the advisory page")]
  ExtractionMiss,

  #[error("no new map ({url} already recorded)")]
  DuplicateMap { url: String, dangling: bool },

  #[error("map {url} already recorded for {}", .owner.as_deref().unwrap_or("an unknown country"))]
  ClaimConflict { url: String, owner: Option<String> },

  #[error("claim {map_id} has no source URL")]
  EmptyClaim { map_id: Uuid },

  #[error("download for claim {map_id} failed: {source}")]
  Download {
    map_id: Uuid,
    #[source]
    source: DownloadError,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ProcessError {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    ProcessError::Store(Box::new(e))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      ProcessError::Fetch(_) => ErrorKind::Fetch,
      ProcessError::ExtractionMiss => ErrorKind::ExtractionMiss,
      ProcessError::DuplicateMap { .. } => ErrorKind::DuplicateMap,
      ProcessError::ClaimConflict { .. } => ErrorKind::ClaimConflict,
      ProcessError::EmptyClaim { .. } => ErrorKind::EmptyClaim,
      ProcessError::Download { .. } => ErrorKind::Download,
      ProcessError::Store(_) => ErrorKind::Store,
    }
  }
}

// ─── Bootstrap ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BootstrapError {
  #[error("country directory fetch failed: {0}")]
  Fetch(#[from] HttpError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}
