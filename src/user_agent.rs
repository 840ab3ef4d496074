//! Shared identification headers for every outbound request.
//!
//! The source site serves its episode pages to ordinary browsers only, so all
//! traffic presents one desktop browser identity and the site's own referer.

/// Desktop browser User-Agent sent on every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default referer; the source site's home page.
pub const DEFAULT_REFERER: &str = "https://watchanimeworld.net/";

/// `Accept` header value sent with every request.
pub const ACCEPT_ANY: &str = "*/*";
