//! Redirect unshortening.

use tracing::debug;

use crate::fetch::{FetchGuard, FetchedPage};

/// Follows redirects from `url` and returns the final destination.
///
/// Never fails: when the fetch does not succeed the input is returned unchanged.
pub async fn unshorten(fetch: &FetchGuard, url: &str) -> String {
    follow_redirects(fetch, url).await.0
}

/// Like [`unshorten`], but also hands back the destination page so callers
/// that scan it do not fetch it a second time.
pub(crate) async fn follow_redirects(
    fetch: &FetchGuard,
    url: &str,
) -> (String, Option<FetchedPage>) {
    match fetch.fetch(url).await {
        Ok(page) => {
            debug!(from = url, to = %page.url, "Unshortened link");
            (page.url.clone(), Some(page))
        }
        Err(error) => {
            debug!(url, error = %error, "Unshortening failed; keeping original link");
            (url.to_string(), None)
        }
    }
}
