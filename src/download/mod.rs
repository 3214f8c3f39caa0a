//! Asset downloading: streaming, validation, retry and politeness pacing.
//!
//! # Features
//!
//! - Streams to `<dest>.part` and renames only after validation
//! - Validation floor (`min_valid_bytes`) and HTML-instead-of-media detection
//! - Retry with exponential or fixed backoff plus jitter
//! - Per-host pacing shared with page fetches
//! - Idempotent: a valid existing destination is reused without a request
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use harvester_core::config::CrawlerConfig;
//! use harvester_core::download::{AssetDownloader, RateLimiter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlerConfig::default();
//! let limiter = Arc::new(RateLimiter::new(config.politeness_delay));
//! let downloader = AssetDownloader::from_config(&config, limiter)?;
//! let url = url::Url::parse("https://cdn.example.com/dog.mp3")?;
//! let result = downloader.download(&url, Path::new("data/0001_dog.mp3")).await;
//! println!("success={} attempts={}", result.success, result.attempts);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod filename;
pub mod rate_limiter;
mod retry;

pub use client::HttpClient;
pub use engine::{AssetDownloader, DownloadResult, FailureReason};
pub use error::DownloadError;
pub use filename::{asset_filename, sanitize_title, temp_path_for, title_from_url};
pub use rate_limiter::{RateLimiter, extract_host, parse_retry_after};
pub use retry::{
    Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_JITTER, FailureType, RetryDecision, RetryPolicy,
    classify_error, classify_http_status,
};
