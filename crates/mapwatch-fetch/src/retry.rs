//! Bounded-attempt retry policy for async operations.

use std::{fmt::Display, future::Future, time::Duration};

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
  /// Same delay between every attempt.
  Fixed(Duration),
  /// `base * 2^(n-1)` after the n-th failure, never more than `cap`.
  Exponential { base: Duration, cap: Duration },
}

impl Backoff {
  /// Delay after `failures` failed attempts (1-based).
  pub fn delay(&self, failures: u32) -> Duration {
    match *self {
      Backoff::Fixed(delay) => delay,
      Backoff::Exponential { base, cap } => {
        let exp = failures.saturating_sub(1).min(16);
        base.saturating_mul(1 << exp).min(cap)
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first one. Zero is treated as one.
  pub max_attempts: u32,
  pub backoff:      Backoff,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      backoff:      Backoff::Fixed(Duration::from_secs(1)),
    }
  }
}

impl RetryPolicy {
  /// Run `op` until it succeeds, returns an error `is_retryable` rejects, or
  /// the attempt budget is spent. The last error is returned as-is.
  ///
  /// `op` receives the 1-based attempt number.
  pub async fn run<T, E, F, Fut>(
    &self,
    mut op: F,
    is_retryable: impl Fn(&E) -> bool,
  ) -> Result<T, E>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1;
    loop {
      match op(attempt).await {
        Ok(value) => return Ok(value),
        Err(err) if attempt < max_attempts && is_retryable(&err) => {
          let delay = self.backoff.delay(attempt);
          tracing::warn!(
            attempt,
            max_attempts,
            error = %err,
            "attempt failed, retrying in {delay:?}"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }
}
