//! HTML page fetching shared by the crawler and the resolver.
//!
//! [`PageFetcher`] is the seam both components depend on, so tests and
//! embedders can substitute canned pages. [`HttpPageFetcher`] is the
//! production implementation: one GET per call with page timeouts, the
//! shared User-Agent, host pacing through the shared [`RateLimiter`], and
//! optional robots.txt enforcement.
//!
//! Fetch failures are never retried at this layer.

mod robots;

pub use robots::{RobotsCache, RobotsRules, origin_of};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CrawlerConfig;
use crate::download::{RateLimiter, parse_retry_after};

/// A fetched HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL after redirects; relative links resolve against it.
    pub url: Url,
    /// Response body decoded as text.
    pub body: String,
}

/// Why a page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// Page URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// Page URL.
        url: String,
    },

    /// Non-2xx response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Page URL.
        url: String,
        /// Status code.
        status: u16,
    },

    /// robots.txt forbids the page.
    #[error("robots.txt disallows {url}")]
    Disallowed {
        /// Page URL.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build page client: {source}")]
    ClientBuild {
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a transport error, promoting timeouts.
    pub fn network(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Fetches HTML pages.
///
/// Uses `async_trait` so crawler and resolver can hold `Arc<dyn PageFetcher>`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` once.
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, FetchError>;

    /// Returns whether `url` may be requested at all (robots.txt). Defaults to true.
    async fn allows(&self, _url: &Url) -> bool {
        true
    }
}

/// Production [`PageFetcher`] backed by reqwest.
#[derive(Debug)]
pub struct HttpPageFetcher {
    client: Client,
    rate_limiter: Arc<RateLimiter>,
    robots: Option<RobotsCache>,
}

impl HttpPageFetcher {
    /// Builds a fetcher with the page timeouts and User-Agent from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the TLS backend cannot be initialised.
    pub fn new(config: &CrawlerConfig, rate_limiter: Arc<RateLimiter>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.page_connect_timeout)
            .timeout(config.page_read_timeout)
            .gzip(true)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            rate_limiter,
            robots: config.check_robots.then(RobotsCache::new),
        })
    }

    /// Returns whether robots.txt is enforced.
    #[must_use]
    pub fn checks_robots(&self) -> bool {
        self.robots.is_some()
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if !self.allows(url).await {
            return Err(FetchError::Disallowed {
                url: url.to_string(),
            });
        }

        self.rate_limiter.acquire(url.as_str()).await;
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            if let Some(delay) = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
            {
                self.rate_limiter.defer(url.as_str(), delay).await;
            }
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::network(url, e))?;
        debug!(final_url = %final_url, bytes = body.len(), "page fetched");

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }

    async fn allows(&self, url: &Url) -> bool {
        match &self.robots {
            Some(robots) => robots.allows(&self.client, &self.rate_limiter, url).await,
            None => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fetcher(check_robots: bool) -> HttpPageFetcher {
        let config = CrawlerConfig {
            check_robots,
            page_read_timeout: Duration::from_secs(2),
            ..CrawlerConfig::default()
        };
        HttpPageFetcher::new(&config, Arc::new(RateLimiter::disabled())).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_returns_body_and_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/list", server.uri())).unwrap();
        let page = fetcher(false).fetch_page(&url).await.unwrap();
        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(page.url, url);
    }

    #[tokio::test]
    async fn test_fetch_page_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/list", server.uri())).unwrap();
        let err = fetcher(false).fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_fetch_page_respects_robots_when_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /list\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("page"))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/list", server.uri())).unwrap();
        let err = fetcher(true).fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Disallowed { .. }));

        // Without robots enforcement the same page is fetched.
        assert!(fetcher(false).fetch_page(&url).await.is_ok());
    }
}
