//! Shared fixtures for pipeline tests: a wiremock site, an in-memory store
//! and a temporary download directory.

use std::time::Duration;

use mapwatch_core::{country::Country, store::MapStore};
use mapwatch_store_sqlite::SqliteStore;
use tempfile::TempDir;
use url::Url;
use wiremock::{
  matchers::{method, path},
  Mock, MockServer, ResponseTemplate,
};

use crate::{
  http::{HttpClient, HttpSettings},
  processor::CountryProcessor,
  retry::{Backoff, RetryPolicy},
};

pub struct Fixture {
  pub server:    MockServer,
  pub store:     SqliteStore,
  pub dir:       TempDir,
  pub processor: CountryProcessor<SqliteStore>,
}

impl Fixture {
  pub fn site_url(&self) -> Url { site_url(&self.server) }
}

pub fn site_url(server: &MockServer) -> Url {
  Url::parse(&format!("{}/", server.uri())).unwrap()
}

pub fn test_http() -> HttpClient {
  HttpClient::new(&HttpSettings {
    user_agent:      "mapwatch-test/1.0".into(),
    max_connections: 8,
    timeout:         Duration::from_secs(5),
    retry:           RetryPolicy { max_attempts: 3, backoff: Backoff::Fixed(Duration::ZERO) },
  })
  .unwrap()
}

/// A mock site and a store holding `countries` as `(id, name)` pairs, each
/// with its advisory page at `/fr/pays/{id}/`.
pub async fn fixture(countries: &[(&str, &str)]) -> Fixture {
  let server = MockServer::start().await;
  let store = SqliteStore::open_in_memory().await.unwrap();
  for (id, name) in countries {
    store
      .create_country(Country::new(*id, *name, format!("/fr/pays/{id}/")))
      .await
      .unwrap();
  }
  let dir = tempfile::tempdir().unwrap();
  let processor = CountryProcessor::new(
    store.clone(),
    test_http(),
    site_url(&server),
    dir.path().to_path_buf(),
  );
  Fixture { server, store, dir, processor }
}

pub fn gallery_page(img_src: &str) -> String {
  format!(
    r#"<html><body><dl class="spip_documents"><dt><img src="{img_src}"></dt></dl></body></html>"#
  )
}

pub async fn serve_page(server: &MockServer, country_id: &str, html: String) {
  Mock::given(method("GET"))
    .and(path(format!("/fr/pays/{country_id}/")))
    .respond_with(ResponseTemplate::new(200).set_body_string(html))
    .mount(server)
    .await;
}

pub async fn serve_image(server: &MockServer, p: &str, status: u16, body: &[u8]) {
  Mock::given(method("GET"))
    .and(path(p))
    .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
    .mount(server)
    .await;
}

/// A bare HTTP server that announces `Content-Length: 1000` for every
/// request, sends ten bytes and hangs up. Returns its `host:port`.
pub async fn serve_truncated_body() -> String {
  use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpListener,
  };

  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    while let Ok((mut socket, _)) = listener.accept().await {
      let mut request = Vec::new();
      let mut buf = [0u8; 1024];
      while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
          Ok(0) | Err(_) => break,
          Ok(n) => request.extend_from_slice(&buf[..n]),
        }
      }
      let _ = socket
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: 1000\r\n\r\n0123456789")
        .await;
      let _ = socket.shutdown().await;
    }
  });
  addr.to_string()
}
