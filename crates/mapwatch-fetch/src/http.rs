//! Shared HTTP client with a connection cap and retries.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use reqwest::Client;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::{error::HttpError, retry::RetryPolicy};

/// Default cap on in-flight requests.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
  pub user_agent:      String,
  pub max_connections: usize,
  pub timeout:         Duration,
  pub retry:           RetryPolicy,
}

/// Async HTTP client shared by every country task.
///
/// Cheap to clone: the inner [`reqwest::Client`] and the permit pool are
/// `Arc`-based. At most `max_connections` responses are alive at once; a
/// permit is held until the response body has been consumed or dropped.
#[derive(Clone)]
pub struct HttpClient {
  client:  Client,
  permits: Arc<Semaphore>,
  retry:   RetryPolicy,
}

impl HttpClient {
  pub fn new(settings: &HttpSettings) -> Result<Self, HttpError> {
    let max_connections = settings.max_connections.max(1);
    let client = Client::builder()
      .user_agent(settings.user_agent.as_str())
      .timeout(settings.timeout)
      .pool_max_idle_per_host(max_connections)
      .build()
      .map_err(HttpError::Build)?;
    Ok(Self {
      client,
      permits: Arc::new(Semaphore::new(max_connections)),
      retry: settings.retry,
    })
  }

  /// `GET` a page and return its body as text.
  ///
  /// The whole exchange (request and body read) is retried.
  pub async fn get_text(&self, url: &Url) -> Result<String, HttpError> {
    self
      .retry
      .run(
        |_| async move { self.send_once(url).await?.text().await },
        HttpError::is_retryable,
      )
      .await
  }

  /// `GET` a resource for incremental consumption.
  ///
  /// Only the request is retried; once headers are in, the body is handed
  /// over as a [`BodyStream`].
  pub async fn get_stream(&self, url: &Url) -> Result<BodyStream, HttpError> {
    self
      .retry
      .run(|_| self.send_once(url), HttpError::is_retryable)
      .await
  }

  async fn send_once(&self, url: &Url) -> Result<BodyStream, HttpError> {
    let permit = Arc::clone(&self.permits)
      .acquire_owned()
      .await
      .map_err(|_| HttpError::PoolClosed)?;

    let response = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|source| HttpError::Request { url: url.to_string(), source })?;

    let status = response.status();
    if !status.is_success() {
      return Err(HttpError::Status { url: url.to_string(), status });
    }

    Ok(BodyStream { url: url.to_string(), response, _permit: permit })
  }
}

/// A successful response whose body has not been read yet.
pub struct BodyStream {
  url:      String,
  response: reqwest::Response,
  _permit:  OwnedSemaphorePermit,
}

impl BodyStream {
  pub fn content_length(&self) -> Option<u64> { self.response.content_length() }

  /// Next body chunk, or `None` once the body is exhausted.
  pub async fn chunk(&mut self) -> Result<Option<Bytes>, HttpError> {
    self
      .response
      .chunk()
      .await
      .map_err(|source| HttpError::Request { url: self.url.clone(), source })
  }

  pub async fn text(self) -> Result<String, HttpError> {
    let url = self.url;
    self
      .response
      .text()
      .await
      .map_err(|source| HttpError::Request { url, source })
  }
}
