//! mapwatch binary.
//!
//! Reads `mapwatch.toml` (or the path given with `--config`), opens the
//! SQLite store, populates the country list on first use, then checks every
//! country once for a new advisory map.

use std::{
  fs::OpenOptions,
  path::{Path, PathBuf},
  sync::Mutex,
};

use anyhow::Context as _;
use clap::Parser;
use mapwatch_fetch::{
  bootstrap::ensure_countries,
  config::{FetchConfig, expand_tilde},
  download::run_directory,
  http::HttpClient,
  Coordinator, CountryProcessor,
};
use mapwatch_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
#[command(author, version, about = "Download new travel-advisory maps")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "mapwatch.toml")]
  config: PathBuf,

  /// SQLite database file; overrides `store_path` from the configuration.
  #[arg(long)]
  store: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let mut cfg = FetchConfig::load(cli.config).context("failed to read configuration")?;
  if let Some(store) = cli.store {
    cfg.store_path = store;
  }

  init_tracing(cfg.log_file.as_deref().map(expand_tilde).as_deref())?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let http = HttpClient::new(&cfg.http_settings()).context("failed to build HTTP client")?;

  let countries = ensure_countries(&store, &http, &cfg.directory_url()?)
    .await
    .context("failed to load the country list")?;
  tracing::info!("{countries} countries to check");

  let started_on = chrono::Local::now().date_naive();
  let download_dir = run_directory(&expand_tilde(&cfg.download_root), started_on);
  tokio::fs::create_dir_all(&download_dir)
    .await
    .with_context(|| format!("failed to create {download_dir:?}"))?;

  let processor = CountryProcessor::new(store, http, cfg.site_url()?, download_dir);
  Coordinator::new(processor)
    .repair_dangling(cfg.repair_dangling)
    .run()
    .await
    .context("run aborted")?;

  Ok(())
}

/// Console output plus, when configured, a plain-text copy appended to
/// `log_file`.
fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
  let file_layer = log_file
    .map(|path| {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {path:?}"))?;
      anyhow::Ok(
        tracing_subscriber::fmt::layer()
          .with_ansi(false)
          .with_writer(Mutex::new(file)),
      )
    })
    .transpose()?;

  tracing_subscriber::registry()
    .with(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with(tracing_subscriber::fmt::layer())
    .with(file_layer)
    .init();
  Ok(())
}
