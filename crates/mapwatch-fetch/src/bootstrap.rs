//! One-time population of the country list from the site's directory page.

use std::{collections::HashSet, sync::LazyLock};

use mapwatch_core::{country::Country, store::MapStore};
use scraper::{Html, Selector};
use url::Url;

use crate::{error::BootstrapError, http::HttpClient};

static COUNTRY_OPTIONS: LazyLock<Selector> = LazyLock::new(|| {
  Selector::parse("div.clearfix select#recherche_pays option").expect("static selector")
});

/// Label of the select box's placeholder entry.
const PLACEHOLDER: &str = "Sélectionnez un pays/destination";

/// Countries listed in the directory page's destination picker, in page
/// order, without duplicates.
///
/// The id is the second-to-last `/`-separated segment of the option value,
/// so `…/conseils-par-pays-destination/chili/` yields `chili`.
pub fn parse_country_directory(html: &str) -> Vec<Country> {
  let document = Html::parse_document(html);
  let mut seen = HashSet::new();

  document
    .select(&COUNTRY_OPTIONS)
    .filter_map(|option| {
      let name = option.text().collect::<String>().trim().to_owned();
      let value = option.value().attr("value")?.trim();
      if name == PLACEHOLDER || value.is_empty() {
        return None;
      }
      let segments: Vec<&str> = value.split('/').collect();
      let id = segments.len().checked_sub(2).map(|i| segments[i])?;
      if id.is_empty() {
        return None;
      }
      Some(Country::new(id, name, value))
    })
    .filter(|country| seen.insert(country.country_id.clone()))
    .collect()
}

/// Make sure the store knows about the countries to watch.
///
/// Does nothing if any country is already stored; otherwise scrapes
/// `directory_url`. Returns the number of countries in the store.
pub async fn ensure_countries<S: MapStore>(
  store: &S,
  http: &HttpClient,
  directory_url: &Url,
) -> Result<usize, BootstrapError> {
  let existing = store
    .count_countries()
    .await
    .map_err(|e| BootstrapError::Store(Box::new(e)))?;
  if existing > 0 {
    return Ok(existing);
  }

  tracing::info!(url = %directory_url, "no countries stored, reading country directory");
  let page = http.get_text(directory_url).await?;
  let countries = parse_country_directory(&page);
  if countries.is_empty() {
    tracing::warn!(url = %directory_url, "country directory listed no countries");
  }

  // One batch: a failure must not leave a partial list behind, since a
  // non-empty store is never bootstrapped again.
  let count = store
    .create_countries(countries)
    .await
    .map_err(|e| BootstrapError::Store(Box::new(e)))?
    .len();
  tracing::info!("stored {count} countries");
  Ok(count)
}

#[cfg(test)]
mod tests {
  use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
  };

  use mapwatch_store_sqlite::SqliteStore;

  use super::*;
  use crate::test_support::test_http;

  const DIRECTORY: &str = r#"
    <html><body>
      <div class="clearfix">
        <select id="recherche_pays">
          <option value="">Sélectionnez un pays/destination</option>
          <option value="https://www.diplomatie.gouv.fr/fr/conseils-aux-voyageurs/conseils-par-pays-destination/afghanistan/">Afghanistan</option>
          <option value="https://www.diplomatie.gouv.fr/fr/conseils-aux-voyageurs/conseils-par-pays-destination/afrique-du-sud/"> Afrique du Sud </option>
          <option value="https://www.diplomatie.gouv.fr/fr/conseils-aux-voyageurs/conseils-par-pays-destination/afghanistan/">Afghanistan</option>
        </select>
      </div>
      <select id="recherche_pays"><option value="/outside/clearfix/">Ignored</option></select>
    </body></html>"#;

  #[test]
  fn parses_options_and_skips_placeholder_and_duplicates() {
    let countries = parse_country_directory(DIRECTORY);
    let ids: Vec<&str> = countries.iter().map(|c| c.country_id.as_str()).collect();
    assert_eq!(ids, ["afghanistan", "afrique-du-sud"]);
    assert_eq!(countries[1].name, "Afrique du Sud");
    assert!(countries[0].url.ends_with("/conseils-par-pays-destination/afghanistan/"));
  }

  #[tokio::test]
  async fn populates_an_empty_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/directory/"))
      .respond_with(ResponseTemplate::new(200).set_body_string(DIRECTORY))
      .expect(1)
      .mount(&server)
      .await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let url = Url::parse(&format!("{}/directory/", server.uri())).unwrap();

    let count = ensure_countries(&store, &test_http(), &url).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(store.count_countries().await.unwrap(), 2);
    let afghanistan = store.get_country("afghanistan").await.unwrap().unwrap();
    assert_eq!(afghanistan.name, "Afghanistan");
  }

  #[tokio::test]
  async fn failed_batch_does_not_block_a_later_bootstrap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/directory/"))
      .respond_with(ResponseTemplate::new(200).set_body_string(DIRECTORY))
      .expect(1)
      .mount(&server)
      .await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let url = Url::parse(&format!("{}/directory/", server.uri())).unwrap();

    let mut batch = parse_country_directory(DIRECTORY);
    batch.push(batch[0].clone());
    assert!(store.create_countries(batch).await.is_err());
    assert_eq!(store.count_countries().await.unwrap(), 0);

    let count = ensure_countries(&store, &test_http(), &url).await.unwrap();
    assert_eq!(count, 2);
  }

  #[tokio::test]
  async fn leaves_a_populated_store_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_string(DIRECTORY))
      .expect(0)
      .mount(&server)
      .await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .create_country(Country::new("chili", "Chili", "/fr/pays/chili/"))
      .await
      .unwrap();
    let url = Url::parse(&format!("{}/directory/", server.uri())).unwrap();

    let count = ensure_countries(&store, &test_http(), &url).await.unwrap();
    assert_eq!(count, 1);
  }
}
