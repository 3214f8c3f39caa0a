//! Paginated listing crawler.
//!
//! [`PageCrawler::crawl`] walks listing pages one at a time and yields
//! de-duplicated [`AssetReference`]s until the target count is met, pagination
//! runs out, the page cap is hit, a page fails to load, or the run is
//! cancelled. Which of these ended the crawl is reported as a [`CrawlStop`];
//! none of them is an error.

mod selector;

pub use selector::{ListingSelector, Pagination, RegexListingSelector, increment_page_param};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch::PageFetcher;
use crate::urls::{absolutize, dedup_key};

/// A candidate link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Listing page the link was found on.
    pub source_page: Url,
    /// The href exactly as written (possibly relative).
    pub raw_href: String,
    /// Visible link text or title attribute; may be empty.
    pub title_hint: String,
}

impl AssetReference {
    /// Creates a reference.
    pub fn new(source_page: Url, raw_href: impl Into<String>, title_hint: impl Into<String>) -> Self {
        Self {
            source_page,
            raw_href: raw_href.into(),
            title_hint: title_hint.into(),
        }
    }

    /// `raw_href` resolved against `source_page`, if it is a usable http(s) link.
    #[must_use]
    pub fn absolute_url(&self) -> Option<Url> {
        absolutize(&self.raw_href, &self.source_page)
    }
}

/// Normalised URLs already yielded in a run. Owned by the caller so several
/// crawls (one per keyword) share one de-duplication scope.
#[derive(Debug, Default, Clone)]
pub struct SeenUrls {
    keys: HashSet<String>,
}

impl SeenUrls {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url`; returns false if it was already present.
    pub fn insert(&mut self, url: &Url) -> bool {
        self.keys.insert(dedup_key(url))
    }

    /// Returns whether `url` was already recorded.
    #[must_use]
    pub fn contains(&self, url: &Url) -> bool {
        self.keys.contains(&dedup_key(url))
    }

    /// Number of distinct URLs recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Why a crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStop {
    /// `target` references were collected.
    TargetReached,
    /// The last page had no next link (or the next link was already visited).
    PaginationExhausted,
    /// `max_pages` pages were visited.
    PageLimitReached,
    /// A listing page could not be fetched.
    FetchFailed,
    /// The cancellation token fired.
    Cancelled,
}

impl fmt::Display for CrawlStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TargetReached => "target reached",
            Self::PaginationExhausted => "pagination exhausted",
            Self::PageLimitReached => "page limit reached",
            Self::FetchFailed => "listing fetch failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Result of one [`PageCrawler::crawl`] call.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// New references, in discovery order, at most `target` long.
    pub references: Vec<AssetReference>,
    /// Listing pages requested.
    pub pages_visited: usize,
    /// Why the crawl ended.
    pub stop: CrawlStop,
}

/// Walks paginated listing pages.
pub struct PageCrawler {
    fetcher: Arc<dyn PageFetcher>,
    selector: Arc<dyn ListingSelector>,
    max_pages: usize,
}

impl fmt::Debug for PageCrawler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCrawler")
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl PageCrawler {
    /// Creates a crawler. `max_pages` is clamped to at least 1.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        selector: Arc<dyn ListingSelector>,
        max_pages: usize,
    ) -> Self {
        Self {
            fetcher,
            selector,
            max_pages: max_pages.max(1),
        }
    }

    /// Returns the page cap.
    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Crawls from `start` until `target` new references are found.
    ///
    /// References whose URL is already in `seen` are dropped; yielded ones are
    /// added to it.
    #[instrument(skip(self, seen, cancel), fields(start = %start))]
    pub async fn crawl(
        &self,
        start: &Url,
        target: usize,
        seen: &mut SeenUrls,
        cancel: &CancellationToken,
    ) -> CrawlOutcome {
        let mut references: Vec<AssetReference> = Vec::new();
        let mut visited = SeenUrls::new();
        let mut page_url = start.clone();
        let mut pages_visited = 0;

        let stop = loop {
            if references.len() >= target {
                break CrawlStop::TargetReached;
            }
            if cancel.is_cancelled() {
                break CrawlStop::Cancelled;
            }
            if pages_visited >= self.max_pages {
                break CrawlStop::PageLimitReached;
            }

            visited.insert(&page_url);
            pages_visited += 1;

            let page = tokio::select! {
                () = cancel.cancelled() => break CrawlStop::Cancelled,
                fetched = self.fetcher.fetch_page(&page_url) => match fetched {
                    Ok(page) => page,
                    Err(error) => {
                        warn!(page = %page_url, error = %error, "listing page failed, ending crawl");
                        break CrawlStop::FetchFailed;
                    }
                },
            };

            let candidates = self.selector.references(&page.body, &page.url);
            let found = candidates.len();
            let mut accepted = 0usize;
            for candidate in candidates {
                if references.len() >= target {
                    break;
                }
                let Some(absolute) = candidate.absolute_url() else {
                    debug!(href = %candidate.raw_href, "skipping unusable href");
                    continue;
                };
                if seen.insert(&absolute) {
                    references.push(candidate);
                    accepted += 1;
                }
            }
            debug!(
                page = %page.url,
                candidates = found,
                accepted,
                total = references.len(),
                "listing page processed"
            );

            if references.len() >= target {
                break CrawlStop::TargetReached;
            }

            match self.selector.next_page(&page.body, &page.url, found) {
                Some(next) if !visited.contains(&next) => page_url = next,
                Some(next) => {
                    debug!(next = %next, "next link points to a visited page");
                    break CrawlStop::PaginationExhausted;
                }
                None => break CrawlStop::PaginationExhausted,
            }
        };

        info!(
            references = references.len(),
            target,
            pages_visited,
            stop = %stop,
            "crawl finished"
        );

        CrawlOutcome {
            references,
            pages_visited,
            stop,
        }
    }
}
