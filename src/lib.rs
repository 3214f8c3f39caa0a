//! Harvester Core Library
//!
//! Crawls paginated media listings, resolves candidate links to direct asset
//! URLs, downloads them with retry and size validation, and records every
//! success in a CSV annotation catalog that can be replayed later.
//!
//! # Architecture
//!
//! - [`crawl`] - paginated listing crawler and listing selectors
//! - [`resolver`] - direct-link detection and intermediate-page extraction
//! - [`download`] - retrying, validating downloader with per-host politeness
//! - [`catalog`] - CSV annotation catalog writer and reader
//! - [`dataset`] - lazy, restartable replay over a catalog or directory
//! - [`pipeline`] - wires the above with bounded concurrency and cancellation
//! - [`config`] - every tunable, TOML file config and validation
//! - [`fetch`] - HTML page fetching and robots.txt

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod crawl;
pub mod dataset;
pub mod download;
pub mod fetch;
pub mod html;
pub mod pipeline;
pub mod resolver;
pub mod urls;
pub mod user_agent;

// Re-export commonly used types
pub use catalog::{CatalogEntry, CatalogError, CatalogWriter, WriteMode, read_all};
pub use config::{ConfigError, CrawlerConfig, FileConfig, SiteConfig};
pub use crawl::{AssetReference, CrawlOutcome, CrawlStop, PageCrawler, RegexListingSelector, SeenUrls};
pub use dataset::{DatasetError, DatasetIterator};
pub use download::{AssetDownloader, DownloadResult, FailureReason, RateLimiter, RetryPolicy};
pub use fetch::{HttpPageFetcher, PageFetcher};
pub use pipeline::{AcquisitionReport, AcquisitionRequest, Pipeline, PipelineError};
pub use resolver::{ResolutionMiss, ResolvedAsset, UrlResolver};
pub use urls::AssetExtensions;
