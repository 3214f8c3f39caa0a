//! Turns candidate links into direct asset URLs.
//!
//! A link that already ends in a known media extension resolves without any
//! network traffic. Anything else is treated as an intermediate detail page:
//! it is fetched exactly once and the configured [`AssetExtractor`]s are run
//! over it in order. Detail pages are never followed further.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvester_core::config::CrawlerConfig;
//! use harvester_core::crawl::AssetReference;
//! use harvester_core::download::RateLimiter;
//! use harvester_core::fetch::HttpPageFetcher;
//! use harvester_core::resolver::UrlResolver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlerConfig::default();
//! let fetcher = Arc::new(HttpPageFetcher::new(&config, Arc::new(RateLimiter::new(config.politeness_delay)))?);
//! let resolver = UrlResolver::new(fetcher, config.asset_extensions.clone());
//!
//! let page = url::Url::parse("https://sounds.example.com/search?q=dog")?;
//! let reference = AssetReference::new(page, "/sound/42/", "Dog bark");
//! match resolver.resolve(&reference).await {
//!     Ok(asset) => println!("{} -> {}", asset.suggested_name, asset.direct_url),
//!     Err(miss) => println!("skipped: {miss}"),
//! }
//! # Ok(())
//! # }
//! ```

mod extract;

pub use extract::{
    AssetExtractor, AttributeExtractor, DEFAULT_ASSET_ATTRIBUTES, DEFAULT_META_PROPERTIES,
    MetaTagExtractor, PlayerTagExtractor, ScriptExtractor, default_extractors,
};

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::crawl::AssetReference;
use crate::download::title_from_url;
use crate::fetch::PageFetcher;
use crate::urls::AssetExtensions;

/// A direct media URL ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// URL of the media payload.
    pub direct_url: Url,
    /// Title used for the file name and the catalog entry.
    pub suggested_name: String,
}

/// Why a reference produced no asset. Misses are skipped, never fatal.
#[derive(Debug, Error)]
pub enum ResolutionMiss {
    /// `raw_href` is not a usable http(s) link.
    #[error("unusable href '{href}' on {page}")]
    InvalidHref {
        /// The href as written.
        href: String,
        /// Listing page it came from.
        page: String,
    },

    /// The intermediate page could not be fetched.
    #[error("intermediate page {url} could not be fetched: {reason}")]
    FetchFailed {
        /// Intermediate page URL.
        url: String,
        /// Fetch error, rendered.
        reason: String,
    },

    /// No extractor found a media URL on the intermediate page.
    #[error("no asset found on {url}")]
    NoMatch {
        /// Intermediate page URL.
        url: String,
    },
}

/// Resolves [`AssetReference`]s with at most one page fetch each.
pub struct UrlResolver {
    fetcher: Arc<dyn PageFetcher>,
    extractors: Vec<Box<dyn AssetExtractor>>,
    extensions: AssetExtensions,
}

impl fmt::Debug for UrlResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.extractors.iter().map(|e| e.name()).collect();
        f.debug_struct("UrlResolver")
            .field("extractors", &names)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl UrlResolver {
    /// Creates a resolver with the built-in extractor order.
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, extensions: AssetExtensions) -> Self {
        Self::with_extractors(fetcher, extensions, default_extractors())
    }

    /// Creates a resolver with a custom ordered extractor list.
    #[must_use]
    pub fn with_extractors(
        fetcher: Arc<dyn PageFetcher>,
        extensions: AssetExtensions,
        extractors: Vec<Box<dyn AssetExtractor>>,
    ) -> Self {
        Self {
            fetcher,
            extractors,
            extensions,
        }
    }

    /// Returns the direct-asset extension set.
    #[must_use]
    pub fn extensions(&self) -> &AssetExtensions {
        &self.extensions
    }

    /// Resolves one reference.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionMiss`] when no direct URL can be produced.
    #[instrument(skip(self, reference), fields(href = %reference.raw_href))]
    pub async fn resolve(&self, reference: &AssetReference) -> Result<ResolvedAsset, ResolutionMiss> {
        let target = reference
            .absolute_url()
            .ok_or_else(|| ResolutionMiss::InvalidHref {
                href: reference.raw_href.clone(),
                page: reference.source_page.to_string(),
            })?;

        if self.extensions.matches_url(&target) {
            debug!(url = %target, "direct asset link");
            return Ok(self.resolved(target, &reference.title_hint));
        }

        let page = self
            .fetcher
            .fetch_page(&target)
            .await
            .map_err(|error| ResolutionMiss::FetchFailed {
                url: target.to_string(),
                reason: error.to_string(),
            })?;

        for extractor in &self.extractors {
            if let Some(direct_url) = extractor.extract(&page.body, &page.url, &self.extensions) {
                debug!(strategy = extractor.name(), url = %direct_url, "asset found on intermediate page");
                return Ok(self.resolved(direct_url, &reference.title_hint));
            }
        }

        debug!(page = %page.url, "no extractor matched");
        Err(ResolutionMiss::NoMatch {
            url: target.to_string(),
        })
    }

    #[allow(clippy::unused_self)]
    fn resolved(&self, direct_url: Url, title_hint: &str) -> ResolvedAsset {
        let title = title_hint.trim();
        let suggested_name = if title.is_empty() {
            title_from_url(&direct_url).unwrap_or_else(|| "asset".to_string())
        } else {
            title.to_string()
        };
        ResolvedAsset {
            direct_url,
            suggested_name,
        }
    }
}
