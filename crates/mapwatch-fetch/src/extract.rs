//! Map image URL extraction from advisory pages.
//!
//! The site uses a handful of layouts. Each rule below recognises one of
//! them; all rules are evaluated in order and the **last** one that matches
//! wins. Reordering them changes the result for the special-cased pages.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Where a rule reads the URL from once its block matched.
#[derive(Debug, Clone, Copy)]
enum Target {
  /// `src` of the first `<img>` inside the block.
  ImgSrc,
  /// `href` of the block itself.
  Href,
}

struct Rule {
  selector: Selector,
  target:   Target,
}

impl Rule {
  fn new(selector: &str, target: Target) -> Self {
    Self {
      selector: Selector::parse(selector).expect("static selector"),
      target,
    }
  }

  /// The rule's URL for `document`, if its block is present and carries the
  /// expected attribute.
  fn apply(&self, document: &Html) -> Option<String> {
    let block = document.select(&self.selector).next()?;
    let value = match self.target {
      Target::ImgSrc => first_img(block)?.value().attr("src")?,
      Target::Href => block.value().attr("href")?,
    };
    Some(value.to_owned())
  }
}

static IMG: LazyLock<Selector> =
  LazyLock::new(|| Selector::parse("img").expect("static selector"));

static RULES: LazyLock<[Rule; 3]> = LazyLock::new(|| {
  [
    // Generic document gallery, used by most countries.
    Rule::new("dl.spip_documents", Target::ImgSrc),
    // Mediabox link (Afghanistan).
    Rule::new("a.spip_in.mediabox", Target::Href),
    // Figure gallery (Afrique du Sud).
    Rule::new("figure.spip_documents", Target::ImgSrc),
  ]
});

fn first_img(block: ElementRef<'_>) -> Option<ElementRef<'_>> { block.select(&IMG).next() }

/// Best-guess map image URL for an advisory page, normalized with
/// [`normalize_map_url`]. `None` when no layout rule matched.
pub fn extract_image_url(document: &Html) -> Option<String> {
  let raw = RULES.iter().filter_map(|rule| rule.apply(document)).last()?;
  normalize_map_url(&raw)
}

/// Parse `html` and run [`extract_image_url`] on it.
pub fn find_map_url(html: &str) -> Option<String> {
  let document = Html::parse_document(html);
  extract_image_url(&document)
}

/// Reduce a URL to network location + path, dropping scheme, query string
/// and fragment. Relative URLs keep their path as written.
pub fn normalize_map_url(raw: &str) -> Option<String> {
  let raw = raw.trim();
  let normalized = match Url::parse(raw) {
    Ok(url) => {
      let mut netloc = url.host_str().unwrap_or_default().to_owned();
      if let Some(port) = url.port() {
        netloc.push_str(&format!(":{port}"));
      }
      format!("{netloc}{}", url.path())
    }
    Err(url::ParseError::RelativeUrlWithoutBase) => {
      let end = raw.find(['?', '#']).unwrap_or(raw.len());
      let relative = &raw[..end];
      relative.strip_prefix("//").unwrap_or(relative).to_owned()
    }
    Err(_) => return None,
  };
  (!normalized.is_empty()).then_some(normalized)
}

/// Absolute download URL for a normalized map URL.
///
/// A first segment that looks like a host name (`www.example.org/…`) is
/// taken as the network location and gets the site's scheme. Anything else
/// is resolved against the site root.
pub fn resolve_map_url(site: &Url, map_url: &str) -> Result<Url, url::ParseError> {
  match map_url.split_once('/') {
    Some((first, _)) if first.contains('.') && !first.starts_with('.') => {
      Url::parse(&format!("{}://{map_url}", site.scheme()))
    }
    _ => site.join(map_url),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GALLERY: &str = r#"
    <dl class="spip_documents spip_documents_center">
      <dt><img src="IMG/jpg/carte_chili_20210315.jpg?1615802530" alt=""></dt>
    </dl>"#;
  const MEDIABOX: &str = r#"
    <a href="IMG/png/afghanistan.png?1600000000" class="spip_in mediabox">
      <img src="local/cache-vignettes/L400/afghanistan.png">
    </a>"#;
  const FIGURE: &str = r#"
    <figure class="spip_documents">
      <img src="IMG/jpg/afrique_du_sud.jpg?42#zoom">
    </figure>"#;

  fn page(blocks: &[&str]) -> String {
    format!("<html><body><div id=\"content\">{}</div></body></html>", blocks.concat())
  }

  #[test]
  fn gallery_block_alone_is_query_stripped() {
    assert_eq!(
      find_map_url(&page(&[GALLERY])).as_deref(),
      Some("IMG/jpg/carte_chili_20210315.jpg")
    );
  }

  #[test]
  fn mediabox_link_overrides_gallery() {
    assert_eq!(
      find_map_url(&page(&[GALLERY, MEDIABOX])).as_deref(),
      Some("IMG/png/afghanistan.png")
    );
  }

  #[test]
  fn figure_gallery_overrides_everything() {
    assert_eq!(
      find_map_url(&page(&[GALLERY, FIGURE])).as_deref(),
      Some("IMG/jpg/afrique_du_sud.jpg")
    );
    // Document order does not matter, only rule order.
    assert_eq!(
      find_map_url(&page(&[FIGURE, MEDIABOX, GALLERY])).as_deref(),
      Some("IMG/jpg/afrique_du_sud.jpg")
    );
  }

  #[test]
  fn first_matching_block_of_a_rule_is_used() {
    let second = GALLERY.replace("carte_chili_20210315", "other");
    assert_eq!(
      find_map_url(&page(&[GALLERY, &second])).as_deref(),
      Some("IMG/jpg/carte_chili_20210315.jpg")
    );
  }

  #[test]
  fn page_without_known_layout_yields_none() {
    let html = page(&[r#"<p><img src="IMG/jpg/logo.jpg"></p>"#, r#"<a class="mediabox">x</a>"#]);
    assert_eq!(find_map_url(&html), None);
  }

  #[test]
  fn block_missing_its_attribute_does_not_override() {
    let broken_figure = r#"<figure class="spip_documents"><figcaption>no image</figcaption></figure>"#;
    assert_eq!(
      find_map_url(&page(&[GALLERY, broken_figure])).as_deref(),
      Some("IMG/jpg/carte_chili_20210315.jpg")
    );
  }

  #[test]
  fn absolute_urls_keep_host_and_path() {
    assert_eq!(
      normalize_map_url("https://www.diplomatie.gouv.fr/IMG/jpg/x.jpg?1#top").as_deref(),
      Some("www.diplomatie.gouv.fr/IMG/jpg/x.jpg")
    );
    assert_eq!(
      normalize_map_url("http://127.0.0.1:8080/IMG/x.jpg").as_deref(),
      Some("127.0.0.1:8080/IMG/x.jpg")
    );
    assert_eq!(
      normalize_map_url("//cdn.example.org/a.jpg?v=2").as_deref(),
      Some("cdn.example.org/a.jpg")
    );
  }

  #[test]
  fn empty_values_do_not_normalize() {
    assert_eq!(normalize_map_url(""), None);
    assert_eq!(normalize_map_url("?only=query"), None);
  }

  #[test]
  fn resolves_relative_paths_against_site_root() {
    let site = Url::parse("https://www.diplomatie.gouv.fr/").unwrap();
    assert_eq!(
      resolve_map_url(&site, "IMG/jpg/x.jpg").unwrap().as_str(),
      "https://www.diplomatie.gouv.fr/IMG/jpg/x.jpg"
    );
    assert_eq!(
      resolve_map_url(&site, "www.diplomatie.gouv.fr/IMG/jpg/x.jpg").unwrap().as_str(),
      "https://www.diplomatie.gouv.fr/IMG/jpg/x.jpg"
    );
    assert_eq!(
      resolve_map_url(&site, "../IMG/jpg/x.jpg").unwrap().as_str(),
      "https://www.diplomatie.gouv.fr/IMG/jpg/x.jpg"
    );
  }
}
