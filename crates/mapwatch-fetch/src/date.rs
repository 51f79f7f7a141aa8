//! Publication date inference from map file names.
//!
//! Patterns are tried in order and the **first** one that yields a valid date
//! wins, unlike the extraction rules where the last match wins.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;

/// Which pattern produced an [`InferredDate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
  /// Eight digits read as `YYYYMMDD`.
  CompactYearFirst,
  /// Eight digits read as `DDMMYYYY` because the year-first reading was
  /// before 2013. An empirical correction for the site's older uploads.
  CompactDayFirst,
  /// `DD-MM-YYYY`.
  Dashed,
  /// `DD-MM-YY`.
  DashedShortYear,
  /// Nothing matched; the timestamp is the time of the call.
  Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferredDate {
  pub published_at: DateTime<Utc>,
  pub source:       DateSource,
}

impl InferredDate {
  /// `true` when no pattern matched and the date is just "now". Callers
  /// should log this with the context they have.
  pub fn is_fallback(&self) -> bool { self.source == DateSource::Fallback }
}

/// First year in which the site is assumed to use `YYYYMMDD` names.
const COMPACT_YEAR_FIRST_SINCE: i32 = 2013;

// A greedy `^.*` prefix picks the rightmost candidate in the name. Digits
// are ASCII only: `\d` would also match other scripts' digits, which are
// multi-byte and can't be sliced by position.
static EIGHT_DIGITS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^.*([0-9]{8})").expect("static regex"));
static DASHED: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^.*([0-9]{2}-[0-9]{2}-[0-9]{4})").expect("static regex"));
static DASHED_SHORT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^.*([0-9]{2}-[0-9]{2}-[0-9]{2})").expect("static regex"));

type DateRule = fn(&str) -> Option<(NaiveDate, DateSource)>;

const RULES: [DateRule; 3] = [compact, dashed, dashed_short_year];

fn capture<'a>(re: &Regex, name: &'a str) -> Option<&'a str> {
  re.captures(name)?.get(1).map(|m| m.as_str())
}

fn compact(name: &str) -> Option<(NaiveDate, DateSource)> {
  let digits = capture(&EIGHT_DIGITS, name)?;
  let year: i32 = digits.get(..4)?.parse().ok()?;
  if year < COMPACT_YEAR_FIRST_SINCE {
    NaiveDate::parse_from_str(digits, "%d%m%Y")
      .ok()
      .map(|d| (d, DateSource::CompactDayFirst))
  } else {
    NaiveDate::parse_from_str(digits, "%Y%m%d")
      .ok()
      .map(|d| (d, DateSource::CompactYearFirst))
  }
}

fn dashed(name: &str) -> Option<(NaiveDate, DateSource)> {
  let text = capture(&DASHED, name)?;
  NaiveDate::parse_from_str(text, "%d-%m-%Y")
    .ok()
    .map(|d| (d, DateSource::Dashed))
}

fn dashed_short_year(name: &str) -> Option<(NaiveDate, DateSource)> {
  let text = capture(&DASHED_SHORT, name)?;
  NaiveDate::parse_from_str(text, "%d-%m-%y")
    .ok()
    .map(|d| (d, DateSource::DashedShortYear))
}

/// Last path segment of a URL, without query string or fragment.
pub fn file_name(url: &str) -> &str {
  let end = url.find(['?', '#']).unwrap_or(url.len());
  let path = &url[..end];
  path.rsplit('/').next().unwrap_or(path)
}

/// Infer the publication date of the map at `url` from its file name.
pub fn infer_date(url: &str) -> InferredDate { infer_date_at(url, Utc::now()) }

/// [`infer_date`] with an explicit fallback timestamp.
pub fn infer_date_at(url: &str, now: DateTime<Utc>) -> InferredDate {
  let name = file_name(url);
  RULES
    .iter()
    .find_map(|rule| rule(name))
    .map(|(date, source)| InferredDate {
      published_at: date.and_time(NaiveTime::MIN).and_utc(),
      source,
    })
    .unwrap_or(InferredDate { published_at: now, source: DateSource::Fallback })
}
