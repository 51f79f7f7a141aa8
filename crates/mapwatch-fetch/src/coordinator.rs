//! Fans the country pipeline out over every country and joins the results.
//!
//! Concurrency is bounded only by the HTTP client's connection cap. A failed
//! or panicking task is logged and counted; it never cancels its siblings.

use std::collections::BTreeMap;

use mapwatch_core::store::MapStore;
use tokio::task::JoinSet;

use crate::{
  date::DateSource,
  error::{ErrorKind, ProcessError},
  processor::{CountryProcessor, Downloaded, log_outcome},
};

/// Per-run counts, logged when the run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
  /// New maps downloaded by the country pipelines.
  pub downloaded:     usize,
  /// Dangling claims from earlier runs completed by the repair sweep.
  pub repaired:       usize,
  /// Successful downloads whose date was not found in the file name.
  pub date_fallbacks: usize,
  pub failures:       BTreeMap<ErrorKind, usize>,
  /// Tasks that panicked instead of returning.
  pub panicked:       usize,
}

impl RunSummary {
  pub fn failures_of(&self, kind: ErrorKind) -> usize {
    self.failures.get(&kind).copied().unwrap_or(0)
  }

  fn record(&mut self, result: &Result<Downloaded, ProcessError>) -> bool {
    match result {
      Ok(done) => {
        if done.date_source == DateSource::Fallback {
          self.date_fallbacks += 1;
        }
        true
      }
      Err(e) => {
        *self.failures.entry(e.kind()).or_default() += 1;
        false
      }
    }
  }

  fn log(&self) {
    let failures = self
      .failures
      .iter()
      .map(|(kind, n)| format!("{kind}={n}"))
      .collect::<Vec<_>>()
      .join(" ");
    tracing::info!(
      downloaded = self.downloaded,
      repaired = self.repaired,
      date_fallbacks = self.date_fallbacks,
      panicked = self.panicked,
      "run finished ({})",
      if failures.is_empty() { "no failures" } else { failures.as_str() }
    );
  }
}

pub struct Coordinator<S> {
  processor:       CountryProcessor<S>,
  repair_dangling: bool,
}

impl<S> Coordinator<S>
where
  S: MapStore + Clone + 'static,
{
  pub fn new(processor: CountryProcessor<S>) -> Self {
    Self { processor, repair_dangling: true }
  }

  /// Whether to retry the downloads of dangling claims before the main pass.
  pub fn repair_dangling(mut self, enabled: bool) -> Self {
    self.repair_dangling = enabled;
    self
  }

  /// Run the pipeline for every country and wait for all of them.
  ///
  /// Only a failure to read the store's country or claim lists aborts the
  /// run; per-country failures end up in the summary.
  pub async fn run(&self) -> Result<RunSummary, S::Error> {
    let mut summary = RunSummary::default();

    if self.repair_dangling {
      self.repair(&mut summary).await?;
    }

    let countries = self.processor.store().list_countries().await?;
    tracing::info!("processing {} countries", countries.len());

    let mut tasks = JoinSet::new();
    for country in countries {
      let processor = self.processor.clone();
      tasks.spawn(async move {
        tracing::debug!(country = %country.country_id, "processing {}", country.name);
        let result = processor.process(&country).await;
        log_outcome(&country.country_id, &result);
        result
      });
    }

    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(result) => {
          if summary.record(&result) {
            summary.downloaded += 1;
          }
        }
        Err(e) => {
          tracing::error!(error = %e, "country task panicked");
          summary.panicked += 1;
        }
      }
    }

    summary.log();
    Ok(summary)
  }

  /// Re-run the download phase once for every claim left dangling by an
  /// earlier run.
  async fn repair(&self, summary: &mut RunSummary) -> Result<(), S::Error> {
    let dangling = self.processor.store().list_dangling_maps().await?;
    if dangling.is_empty() {
      return Ok(());
    }
    tracing::info!("retrying {} dangling claims", dangling.len());

    let mut tasks = JoinSet::new();
    for record in dangling {
      let processor = self.processor.clone();
      tasks.spawn(async move {
        let country_id = record.country_id.clone();
        let result = processor.complete_download(record).await;
        log_outcome(&country_id, &result);
        result
      });
    }

    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(result) => {
          if summary.record(&result) {
            summary.repaired += 1;
          }
        }
        Err(e) => {
          tracing::error!(error = %e, "repair task panicked");
          summary.panicked += 1;
        }
      }
    }
    Ok(())
  }
}
