//! End-to-end acquisition: crawl, resolve, download, catalog.
//!
//! Listing pages are crawled one at a time into a single de-duplicated
//! reference list. References are then handed to a bounded pool of worker
//! tasks (`concurrency` permits) that resolve, download and append to the
//! catalog. Only catalog failures and invalid input abort a run; everything
//! else is counted in [`AcquisitionStats`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvester_core::config::CrawlerConfig;
//! use harvester_core::crawl::RegexListingSelector;
//! use harvester_core::pipeline::{AcquisitionRequest, Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlerConfig::default();
//! let pipeline = Pipeline::new(&config, Arc::new(RegexListingSelector::default()))?;
//! let request = AcquisitionRequest::from_keywords(
//!     "https://sounds.example.com/search?q={query}",
//!     ["dog bark"],
//!     100,
//!     "out",
//!     "out/catalog.csv",
//! )?;
//!
//! let report = pipeline.run(&request, &CancellationToken::new()).await?;
//! println!("{} of {} acquired", report.acquired, report.targeted);
//! # Ok(())
//! # }
//! ```

mod request;
mod stats;
mod task;

pub use request::{AcquisitionRequest, MAX_COUNT, MIN_COUNT, QUERY_PLACEHOLDER};
pub use stats::{AcquisitionStats, StatsSnapshot};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::catalog::{CatalogError, CatalogWriter};
use crate::config::{ConfigError, CrawlerConfig};
use crate::crawl::{AssetReference, CrawlStop, ListingSelector, PageCrawler, SeenUrls};
use crate::download::{AssetDownloader, DownloadError, FailureReason, RateLimiter};
use crate::fetch::{FetchError, HttpPageFetcher, PageFetcher};
use crate::resolver::UrlResolver;
use task::{TaskContext, process_reference};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration or request.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Catalog could not be created, written or closed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The output directory could not be created.
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The download client could not be built.
    #[error("download client: {0}")]
    Download(#[from] DownloadError),

    /// The page client could not be built.
    #[error("page client: {0}")]
    Fetch(#[from] FetchError),
}

/// Final summary of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Requested asset count.
    pub targeted: usize,
    /// References yielded by the crawl.
    pub candidates: usize,
    /// Listing pages fetched.
    pub pages_visited: usize,
    /// Assets stored (downloaded or reused).
    pub acquired: usize,
    /// Subset of `acquired` that needed no request.
    pub reused: usize,
    /// Failed downloads.
    pub failed: usize,
    /// References that did not resolve.
    pub resolution_misses: usize,
    /// Asset URLs refused by robots.txt.
    pub robots_skipped: usize,
    /// Failed downloads by reason.
    pub failures: BTreeMap<FailureReason, usize>,
    /// Rows in the catalog when it was closed.
    pub catalog_rows: usize,
    /// Catalog location.
    pub catalog_path: PathBuf,
    /// Whether the run was cancelled before finishing.
    pub cancelled: bool,
}

impl AcquisitionReport {
    /// A run succeeds when at least one asset was acquired.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.acquired > 0
    }
}

/// Wires crawler, resolver, downloader and catalog together.
pub struct Pipeline {
    crawler: PageCrawler,
    resolver: Arc<UrlResolver>,
    downloader: Arc<AssetDownloader>,
    fetcher: Arc<dyn PageFetcher>,
    concurrency: usize,
    stats: Arc<AcquisitionStats>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("crawler", &self.crawler)
            .field("resolver", &self.resolver)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Builds the production pipeline. Page fetches and downloads share one
    /// per-host rate limiter.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or an HTTP client cannot be built.
    pub fn new(
        config: &CrawlerConfig,
        selector: Arc<dyn ListingSelector>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let rate_limiter = Arc::new(RateLimiter::new(config.politeness_delay));
        if rate_limiter.is_disabled() {
            warn!("politeness delay is 0; requests to a host are not paced");
        }
        let fetcher: Arc<dyn PageFetcher> =
            Arc::new(HttpPageFetcher::new(config, Arc::clone(&rate_limiter))?);
        let downloader = AssetDownloader::from_config(config, rate_limiter)?;
        Self::with_components(config, fetcher, selector, downloader)
    }

    /// Builds a pipeline around an explicit page fetcher and downloader.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid.
    pub fn with_components(
        config: &CrawlerConfig,
        fetcher: Arc<dyn PageFetcher>,
        selector: Arc<dyn ListingSelector>,
        downloader: AssetDownloader,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            crawler: PageCrawler::new(Arc::clone(&fetcher), selector, config.max_pages),
            resolver: Arc::new(UrlResolver::new(
                Arc::clone(&fetcher),
                config.asset_extensions.clone(),
            )),
            downloader: Arc::new(downloader),
            fetcher,
            concurrency: config.concurrency,
            stats: Arc::new(AcquisitionStats::new()),
        })
    }

    /// Live counters of the current or last run.
    #[must_use]
    pub fn stats(&self) -> Arc<AcquisitionStats> {
        Arc::clone(&self.stats)
    }

    /// Runs one acquisition.
    ///
    /// Cancelling `cancel` stops new page fetches and downloads; the catalog
    /// is still closed cleanly and the partial report returned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for an invalid request, an output directory
    /// that cannot be created, or any catalog failure.
    #[instrument(skip_all, fields(count = request.count, listings = request.listing_urls.len()))]
    pub async fn run(
        &self,
        request: &AcquisitionRequest,
        cancel: &CancellationToken,
    ) -> Result<AcquisitionReport, PipelineError> {
        request.validate()?;
        self.stats.reset();
        self.stats.set_targeted(request.count);

        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|source| PipelineError::OutputDir {
                path: request.output_dir.clone(),
                source,
            })?;
        let catalog = Arc::new(CatalogWriter::open_for_write(
            &request.catalog_path,
            request.write_mode,
        )?);

        let mut seen = SeenUrls::new();
        let mut references = Vec::new();
        for listing in &request.listing_urls {
            let remaining = request.count.saturating_sub(references.len());
            if remaining == 0 || cancel.is_cancelled() {
                break;
            }
            let outcome = self.crawler.crawl(listing, remaining, &mut seen, cancel).await;
            info!(
                listing = %listing,
                found = outcome.references.len(),
                pages = outcome.pages_visited,
                stop = %outcome.stop,
                "listing crawled"
            );
            self.stats
                .add_candidates(outcome.references.len(), outcome.pages_visited);
            references.extend(outcome.references);
            if outcome.stop == CrawlStop::Cancelled {
                break;
            }
        }

        let ctx = Arc::new(TaskContext {
            resolver: Arc::clone(&self.resolver),
            downloader: Arc::clone(&self.downloader),
            fetcher: Arc::clone(&self.fetcher),
            catalog: Arc::clone(&catalog),
            stats: Arc::clone(&self.stats),
            output_dir: request.output_dir.clone(),
            cancel: cancel.child_token(),
        });
        let catalog_error = self.process_all(references, &ctx).await;
        drop(ctx);

        let catalog_rows = match Arc::try_unwrap(catalog) {
            Ok(writer) => writer.finish()?,
            Err(shared) => shared.rows(),
        };
        if let Some(error) = catalog_error {
            return Err(error.into());
        }

        let snapshot = self.stats.snapshot();
        let report = AcquisitionReport {
            targeted: request.count,
            candidates: snapshot.candidates,
            pages_visited: snapshot.pages_visited,
            acquired: snapshot.acquired,
            reused: snapshot.reused,
            failed: snapshot.failed,
            resolution_misses: snapshot.resolution_misses,
            robots_skipped: snapshot.robots_skipped,
            failures: self.stats.failure_breakdown(),
            catalog_rows,
            catalog_path: request.catalog_path.clone(),
            cancelled: cancel.is_cancelled(),
        };
        info!(
            targeted = report.targeted,
            acquired = report.acquired,
            failed = report.failed,
            misses = report.resolution_misses,
            "acquisition finished"
        );
        Ok(report)
    }

    /// Spawns one task per reference under the concurrency limit and waits
    /// for all of them. Returns the first catalog error, if any.
    async fn process_all(
        &self,
        references: Vec<AssetReference>,
        ctx: &Arc<TaskContext>,
    ) -> Option<CatalogError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles: Vec<JoinHandle<Result<(), CatalogError>>> = Vec::new();

        for (offset, reference) in references.into_iter().enumerate() {
            // Race the permit against cancellation so a full pool does not delay shutdown.
            let permit = tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                break;
            };

            let ctx = Arc::clone(ctx);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                process_reference(&ctx, offset + 1, reference).await
            }));
        }

        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    first_error.get_or_insert(error);
                }
                Err(join_error) => warn!(error = %join_error, "worker task panicked"),
            }
        }
        first_error
    }
}
