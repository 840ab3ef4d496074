//! Link resolution pipeline: episode page in, best playable URL out.
//!
//! The pipeline fetches an episode page once and hands it to an ordered list
//! of [`LinkStrategy`] implementations. The first strategy that produces a
//! non-empty [`ResolvedLink`] wins and later strategies are not consulted.
//!
//! # Architecture
//!
//! - [`LinkStrategy`] - Async trait each extraction strategy implements
//! - [`LinkPipeline`] - Ordered strategy list with the resolution driver
//! - [`EmbeddedDataStrategy`] - Decodes base64 link payloads, unshortens, extracts manifest
//! - [`EmbedIframeStrategy`] - Falls back to trusted player iframes
//! - [`EpisodeResolver`] - The narrow capability the discovery engine consumes
//!
//! # Example
//!
//! ```no_run
//! use tracker_core::fetch::{FetchConfig, FetchGuard};
//! use tracker_core::resolver::{PipelineOptions, build_default_pipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetch = FetchGuard::new(&FetchConfig::default())?;
//! let pipeline = build_default_pipeline(&fetch, &PipelineOptions::default());
//! let url = pipeline
//!     .resolve("https://watchanimeworld.net/episode/naruto-1x1/")
//!     .await?;
//! println!("Best link: {url}");
//! # Ok(())
//! # }
//! ```

mod embed_iframe;
mod embedded_data;
mod error;
mod pipeline;
mod unshorten;

pub use embed_iframe::EmbedIframeStrategy;
pub use embedded_data::{EmbeddedDataStrategy, LinkEntry, decode_link_payload, select_link};
pub use error::ResolveError;
pub use pipeline::LinkPipeline;
pub use unshorten::unshorten;

use async_trait::async_trait;

use crate::fetch::FetchGuard;

/// Language preferred when a payload offers several links.
pub const DEFAULT_PREFERRED_LANGUAGE: &str = "Hindi";

/// Host markers of embed players trusted by the iframe fallback.
pub const DEFAULT_TRUSTED_EMBED_HOSTS: [&str; 3] = ["zephyr", "oxaam", "player"];

/// Builds the default pipeline: embedded-data hunter first, iframe fallback second.
#[must_use]
pub fn build_default_pipeline(fetch: &FetchGuard, options: &PipelineOptions) -> LinkPipeline {
    let mut pipeline = LinkPipeline::new(fetch.clone());
    pipeline.register(Box::new(EmbeddedDataStrategy::new(
        fetch.clone(),
        options.preferred_language.clone(),
    )));
    pipeline.register(Box::new(EmbedIframeStrategy::new(
        fetch.clone(),
        options.trusted_embed_hosts.clone(),
    )));
    pipeline
}

/// Tunables for the default strategies.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Payload language picked when present.
    pub preferred_language: String,
    /// Substrings an iframe `src` must contain to be tried.
    pub trusted_embed_hosts: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            preferred_language: DEFAULT_PREFERRED_LANGUAGE.to_string(),
            trusted_embed_hosts: DEFAULT_TRUSTED_EMBED_HOSTS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// A fetched episode page handed to every strategy.
#[derive(Debug, Clone)]
pub struct EpisodePage {
    /// Final page URL after redirects.
    pub url: String,
    /// Page markup.
    pub body: String,
}

/// Links discovered while resolving one episode, most durable first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Direct HLS manifest.
    pub stream_manifest_url: Option<String>,
    /// Player embed page.
    pub resolved_embed_url: Option<String>,
    /// Link exactly as found in the page payload.
    pub raw_shortened_url: Option<String>,
}

impl ResolvedLink {
    /// Returns manifest, else embed, else raw link.
    #[must_use]
    pub fn best(&self) -> Option<&str> {
        [
            &self.stream_manifest_url,
            &self.resolved_embed_url,
            &self.raw_shortened_url,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|url| !url.is_empty())
    }

    /// Returns true when no usable link is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.best().is_none()
    }
}

/// One way of finding a playable link in an episode page.
///
/// Strategies absorb their own failures and answer `None` when they have
/// nothing; the pipeline then tries the next one.
///
/// # Object Safety
///
/// Uses `async_trait` so strategies can be stored as `Box<dyn LinkStrategy>`.
#[async_trait]
pub trait LinkStrategy: Send + Sync {
    /// Returns the strategy's name for logging.
    fn name(&self) -> &str;

    /// Attempts to find a link in `page`.
    async fn attempt(&self, page: &EpisodePage) -> Option<ResolvedLink>;
}

/// The capability the discovery engine needs: episode URL in, link out.
#[async_trait]
pub trait EpisodeResolver: Send + Sync {
    /// Returns the best playable link for `episode_url`, or `None`.
    async fn resolve_episode(&self, episode_url: &str) -> Option<String>;
}
