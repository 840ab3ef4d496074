//! HTTP client construction policy for the fetch guard.
//!
//! Centralizes timeout, identification headers, compression and egress
//! routing so every outbound request looks the same to the source site.

use std::panic::{AssertUnwindSafe, catch_unwind};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, ClientBuilder, Proxy, redirect};
use tracing::warn;

use super::{FetchConfig, FetchError};

/// Redirect hops followed before a fetch is abandoned.
const MAX_REDIRECTS: usize = 10;

/// Builds the shared client for a fetch guard.
///
/// With an explicit `proxy_url` every request is routed through it and system
/// proxy discovery is skipped. Without one, system and environment proxies
/// apply as usual.
///
/// # Errors
///
/// Returns [`FetchError::ClientBuild`] when the proxy URL or headers are invalid
/// or the client cannot be constructed.
pub(crate) fn build_fetch_client(config: &FetchConfig) -> Result<Client, FetchError> {
    let headers = default_headers(config)?;

    if let Some(proxy_url) = config.proxy_url.as_deref() {
        let proxy = Proxy::all(proxy_url)
            .map_err(|error| FetchError::client_build(&format!("invalid proxy URL: {error}")))?;
        return base_builder(config, headers)
            .no_proxy()
            .proxy(proxy)
            .build()
            .map_err(|error| FetchError::client_build(&error.to_string()));
    }

    match try_build_client(config, headers.clone(), false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; env-proxy fallback keeps construction panic-free.
            warn!("Fetch client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(config, headers, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(FetchError::client_build(
                    "client construction panicked while initializing networking",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(FetchError::client_build(&error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(FetchError::client_build(&error.to_string())),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    config: &FetchConfig,
    headers: HeaderMap,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(config, headers);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn default_headers(config: &FetchConfig) -> Result<HeaderMap, FetchError> {
    let referer = HeaderValue::from_str(&config.referer)
        .map_err(|error| FetchError::client_build(&format!("invalid referer: {error}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, referer);
    headers.insert(ACCEPT, HeaderValue::from_static(crate::user_agent::ACCEPT_ANY));
    Ok(headers)
}

fn base_builder(config: &FetchConfig, headers: HeaderMap) -> ClientBuilder {
    Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
