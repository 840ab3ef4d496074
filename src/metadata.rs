//! Series metadata scraped from a series page at registration time.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::fetch::{FetchError, FetchGuard, FetchOptions};
use crate::utils::{compile_static_regex, strip_tags};

/// Timeout for series page fetches.
pub const METADATA_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Title used when the page has no heading.
pub const DEFAULT_TITLE: &str = "Unknown Anime";

/// Description used when none is available.
pub const DEFAULT_DESCRIPTION: &str = "No description available.";

/// Thumbnail used when none is available.
pub const DEFAULT_THUMBNAIL: &str = "/uploads/default.jpg";

static ENTRY_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<h1[^>]*class=["'][^"']*\bentry-title\b[^"']*["'][^>]*>(.*?)</h1>"#,
    )
});

static FIRST_H1_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<h1\b[^>]*>(.*?)</h1>"));

static GENRE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<(div|span|p|ul|li)[^>]*class=["'][^"']*\b(?:genres|genxed)\b[^"']*["'][^>]*>(.*?)</(?:div|span|p|ul|li)>"#,
    )
});

static ANCHOR_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<a\b[^>]*>(.*?)</a>"));

static CATEGORY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<a\b[^>]*rel=["']category tag["'][^>]*>(.*?)</a>"#)
});

/// Errors raised while scraping series metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The series URL could not be parsed.
    #[error("invalid series URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The URL path has no segment to use as a slug.
    #[error("series URL '{url}' has no slug segment")]
    MissingSlug {
        /// The rejected URL
        url: String,
    },

    /// The series page could not be fetched.
    #[error("could not fetch series page '{url}': {source}")]
    PageUnavailable {
        /// The series URL
        url: String,
        /// Underlying fetch failure
        #[source]
        source: FetchError,
    },
}

/// Metadata for a newly registered series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMetadata {
    /// Title-cased display title.
    pub title: String,
    /// Synopsis.
    pub description: String,
    /// Poster image URL or path.
    pub thumbnail: String,
    /// Genre labels in page order, without duplicates.
    pub genres: Vec<String>,
    /// Site slug.
    pub slug: String,
    /// Known episode count, if any.
    pub total_episodes: Option<u32>,
}

impl SeriesMetadata {
    /// Metadata holding only defaults and `slug`.
    #[must_use]
    pub fn with_slug(slug: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            thumbnail: DEFAULT_THUMBNAIL.to_string(),
            genres: Vec::new(),
            slug: slug.into(),
            total_episodes: None,
        }
    }
}

/// Source of series metadata.
#[async_trait]
pub trait MetadataEnricher: Send + Sync {
    /// Fetches metadata for the series page at `series_url`.
    async fn fetch_details(&self, series_url: &str) -> Result<SeriesMetadata, MetadataError>;
}

/// Scrapes metadata from the series page itself.
#[derive(Debug, Clone)]
pub struct PageMetadataEnricher {
    fetch: FetchGuard,
}

impl PageMetadataEnricher {
    /// Creates an enricher fetching through `fetch`.
    #[must_use]
    pub fn new(fetch: FetchGuard) -> Self {
        Self { fetch }
    }
}

#[async_trait]
impl MetadataEnricher for PageMetadataEnricher {
    #[instrument(skip(self))]
    async fn fetch_details(&self, series_url: &str) -> Result<SeriesMetadata, MetadataError> {
        let slug = slug_from_url(series_url)?;
        let options = FetchOptions {
            timeout: Some(METADATA_FETCH_TIMEOUT),
            ..FetchOptions::default()
        };
        let page = self
            .fetch
            .fetch_with(series_url, options)
            .await
            .map_err(|source| MetadataError::PageUnavailable {
                url: series_url.to_string(),
                source,
            })?;

        let metadata = parse_series_page(&slug, &page.body);
        info!(
            slug = %metadata.slug,
            title = %metadata.title,
            genres = metadata.genres.len(),
            "Scraped series metadata"
        );
        Ok(metadata)
    }
}

/// Returns the last non-empty path segment of `series_url`.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidUrl`] if the URL does not parse, or
/// [`MetadataError::MissingSlug`] if its path is empty.
pub fn slug_from_url(series_url: &str) -> Result<String, MetadataError> {
    let url = Url::parse(series_url).map_err(|error| MetadataError::InvalidUrl {
        url: series_url.to_string(),
        reason: error.to_string(),
    })?;
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(ToString::to_string)
        .ok_or_else(|| MetadataError::MissingSlug {
            url: series_url.to_string(),
        })
}

/// Extracts title and genres from series page markup.
#[must_use]
pub fn parse_series_page(slug: &str, body: &str) -> SeriesMetadata {
    let mut metadata = SeriesMetadata::with_slug(slug);

    let raw_title = [&*ENTRY_TITLE_RE, &*FIRST_H1_RE]
        .into_iter()
        .filter_map(|re| re.captures(body).and_then(|caps| caps.get(1)))
        .map(|m| decode_entities(&strip_tags(m.as_str())))
        .find(|title| !title.is_empty());
    match raw_title {
        Some(title) => metadata.title = to_title_case(&title),
        None => debug!(slug, "No heading found, keeping default title"),
    }

    let mut genres: Vec<String> = Vec::new();
    let block_anchors = GENRE_BLOCK_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(2))
        .flat_map(|block| {
            ANCHOR_TEXT_RE
                .captures_iter(block.as_str())
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
        });
    let category_anchors = CATEGORY_TAG_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));
    for raw in block_anchors.chain(category_anchors) {
        let genre = decode_entities(&strip_tags(&raw));
        if !genre.is_empty() && !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    metadata.genres = genres;
    metadata
}

/// Capitalizes the first letter of each word and lowercases the rest.
#[must_use]
pub fn to_title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            in_word = false;
            out.push(ch);
        } else if in_word {
            out.extend(ch.to_lowercase());
        } else if ch.is_alphanumeric() || ch == '_' {
            in_word = true;
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&#8217;", "'")
        .replace("&#8211;", "-")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_from_url_takes_last_segment() {
        assert_eq!(
            slug_from_url("https://watchanimeworld.net/series/one-piece/").unwrap(),
            "one-piece"
        );
        assert_eq!(slug_from_url("https://site.test/a/b").unwrap(), "b");
    }

    #[test]
    fn test_slug_from_url_rejects_root_and_garbage() {
        assert!(matches!(
            slug_from_url("https://site.test/"),
            Err(MetadataError::MissingSlug { .. })
        ));
        assert!(matches!(
            slug_from_url("not a url"),
            Err(MetadataError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_to_title_case() {
        assert_eq!(to_title_case("ONE piece"), "One Piece");
        assert_eq!(to_title_case("naruto: shippuden"), "Naruto: Shippuden");
        assert_eq!(to_title_case("(hello) wORLD"), "(Hello) World");
        assert_eq!(to_title_case(""), "");
    }

    #[test]
    fn test_parse_prefers_entry_title() {
        let body = r#"<h1>Site Name</h1><h1 class="entry-title">attack on titan</h1>"#;
        let metadata = parse_series_page("aot", body);
        assert_eq!(metadata.title, "Attack On Titan");
    }

    #[test]
    fn test_parse_falls_back_to_first_h1() {
        let metadata = parse_series_page("x", "<h1> <span>Demon Slayer</span> </h1>");
        assert_eq!(metadata.title, "Demon Slayer");
    }

    #[test]
    fn test_parse_without_heading_keeps_defaults() {
        let metadata = parse_series_page("x", "<p>nothing</p>");
        assert_eq!(metadata, SeriesMetadata::with_slug("x"));
        assert_eq!(metadata.thumbnail, DEFAULT_THUMBNAIL);
        assert_eq!(metadata.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_parse_collects_genres_without_duplicates() {
        let body = r#"
            <div class="genres"><a href="/g/action">Action</a>, <a href="/g/drama">Drama</a></div>
            <span class="genxed"><a href="/g/action">Action</a></span>
            <a href="/c/comedy" rel="category tag">Comedy &amp; Fun</a>
        "#;
        let metadata = parse_series_page("x", body);
        assert_eq!(metadata.genres, vec!["Action", "Drama", "Comedy & Fun"]);
    }
}
