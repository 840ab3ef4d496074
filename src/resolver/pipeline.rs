//! Ordered strategy list with the resolution driver.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::fetch::FetchGuard;

use super::{EpisodePage, EpisodeResolver, LinkStrategy, ResolveError, ResolvedLink};

/// An ordered collection of link strategies.
///
/// Strategies are tried in registration order; the first non-empty result
/// ends the resolution.
pub struct LinkPipeline {
    fetch: FetchGuard,
    strategies: Vec<Box<dyn LinkStrategy>>,
}

impl LinkPipeline {
    /// Creates an empty pipeline that fetches pages through `fetch`.
    #[must_use]
    pub fn new(fetch: FetchGuard) -> Self {
        Self {
            fetch,
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy after those already registered.
    #[tracing::instrument(skip(self, strategy), fields(strategy_name))]
    pub fn register(&mut self, strategy: Box<dyn LinkStrategy>) {
        tracing::Span::current().record("strategy_name", strategy.name());
        debug!(
            name = strategy.name(),
            position = self.strategies.len(),
            "Registering link strategy"
        );
        self.strategies.push(strategy);
    }

    /// Returns true if no strategies are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Fetches `episode_url` and returns the first strategy's non-empty result.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::PageUnavailable` if the page cannot be fetched.
    /// Returns `ResolveError::NoLink` if every strategy comes back empty.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_link(&self, episode_url: &str) -> Result<ResolvedLink, ResolveError> {
        let fetched = self
            .fetch
            .fetch(episode_url)
            .await
            .map_err(|error| ResolveError::page_unavailable(episode_url, error))?;
        let page = EpisodePage {
            url: fetched.url,
            body: fetched.body,
        };

        let mut tried_count: usize = 0;
        for strategy in &self.strategies {
            tried_count += 1;
            debug!(strategy = strategy.name(), "Trying link strategy");

            match strategy.attempt(&page).await {
                Some(link) if !link.is_empty() => {
                    info!(
                        strategy = strategy.name(),
                        link = link.best().unwrap_or_default(),
                        "Extracted link"
                    );
                    return Ok(link);
                }
                _ => debug!(strategy = strategy.name(), "Strategy found nothing, trying next"),
            }
        }

        Err(ResolveError::no_link(episode_url, tried_count))
    }

    /// Resolves `episode_url` to its best playable URL.
    ///
    /// # Errors
    ///
    /// Same as [`LinkPipeline::resolve_link`].
    pub async fn resolve(&self, episode_url: &str) -> Result<String, ResolveError> {
        let link = self.resolve_link(episode_url).await?;
        link.best()
            .map(ToString::to_string)
            .ok_or_else(|| ResolveError::no_link(episode_url, self.strategies.len()))
    }
}

#[async_trait]
impl EpisodeResolver for LinkPipeline {
    async fn resolve_episode(&self, episode_url: &str) -> Option<String> {
        match self.resolve(episode_url).await {
            Ok(url) => Some(url),
            Err(error) => {
                debug!(episode_url, error = %error, "Episode did not resolve");
                None
            }
        }
    }
}

impl std::fmt::Debug for LinkPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("LinkPipeline")
            .field("strategy_count", &self.strategies.len())
            .field("strategies", &names)
            .finish()
    }
}
