//! Retrying, validating asset downloader.
//!
//! [`AssetDownloader::download`] never returns an error: every ordinary
//! network or content problem ends in a [`DownloadResult`] with
//! `success == false` and a [`FailureReason`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::HttpClient;
use super::error::DownloadError;
use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::config::CrawlerConfig;

/// Why a download ended without a usable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureReason {
    /// Connect or read timeout on the final attempt.
    Timeout,
    /// Non-2xx status or transport failure.
    HttpError,
    /// Payload below the validation floor.
    TooSmall,
    /// Every attempt of a multi-attempt budget failed on a retryable error.
    ExhaustedRetries,
    /// HTML (or otherwise wrong) content where media was expected.
    InvalidContent,
    /// The payload could not be written locally.
    WriteFailed,
}

impl FailureReason {
    /// Stable snake_case label used in logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HttpError => "http_error",
            Self::TooSmall => "too_small",
            Self::ExhaustedRetries => "exhausted_retries",
            Self::InvalidContent => "invalid_content",
            Self::WriteFailed => "write_failed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&DownloadError> for FailureReason {
    fn from(error: &DownloadError) -> Self {
        match error {
            DownloadError::Timeout { .. } => Self::Timeout,
            DownloadError::Network { .. } | DownloadError::HttpStatus { .. } => Self::HttpError,
            DownloadError::TooSmall { .. } => Self::TooSmall,
            DownloadError::InvalidContent { .. } => Self::InvalidContent,
            DownloadError::Io { .. } | DownloadError::ClientBuild { .. } => Self::WriteFailed,
        }
    }
}

/// Outcome of one [`AssetDownloader::download`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Destination path (populated even on failure).
    pub local_path: PathBuf,
    /// Size of the stored file; 0 on failure.
    pub byte_size: u64,
    /// Whether a valid file now exists at `local_path`.
    pub success: bool,
    /// Set exactly when `success` is false.
    pub failure_reason: Option<FailureReason>,
    /// Attempts made; 0 when an existing valid file was reused.
    pub attempts: u32,
    /// Message of the last error, for logs.
    pub last_error: Option<String>,
}

impl DownloadResult {
    fn stored(local_path: PathBuf, byte_size: u64, attempts: u32) -> Self {
        Self {
            local_path,
            byte_size,
            success: true,
            failure_reason: None,
            attempts,
            last_error: None,
        }
    }

    fn failed(local_path: PathBuf, reason: FailureReason, attempts: u32, error: &DownloadError) -> Self {
        Self {
            local_path,
            byte_size: 0,
            success: false,
            failure_reason: Some(reason),
            attempts,
            last_error: Some(error.to_string()),
        }
    }

    /// True when the file already existed and no request was made.
    #[must_use]
    pub fn reused(&self) -> bool {
        self.success && self.attempts == 0
    }
}

/// Downloads media URLs to local files with retry, validation and pacing.
#[derive(Debug, Clone)]
pub struct AssetDownloader {
    client: HttpClient,
    policy: RetryPolicy,
    min_valid_bytes: u64,
    rate_limiter: Arc<RateLimiter>,
}

impl AssetDownloader {
    /// Creates a downloader from explicit parts.
    #[must_use]
    pub fn new(
        client: HttpClient,
        policy: RetryPolicy,
        min_valid_bytes: u64,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            policy,
            min_valid_bytes,
            rate_limiter,
        }
    }

    /// Creates a downloader from the crawler configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be built.
    pub fn from_config(
        config: &CrawlerConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, DownloadError> {
        let client = HttpClient::new(
            config.download_connect_timeout,
            config.download_read_timeout,
            &config.user_agent,
        )?;
        Ok(Self::new(
            client,
            config.retry_policy(),
            config.min_valid_bytes,
            rate_limiter,
        ))
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the validation floor in bytes.
    #[must_use]
    pub fn min_valid_bytes(&self) -> u64 {
        self.min_valid_bytes
    }

    /// Downloads `url` to `destination`.
    ///
    /// If a file of at least the validation floor already exists at
    /// `destination` it is reused without any request (`attempts == 0`).
    #[instrument(skip(self, destination), fields(url = %url, dest = %destination.display()))]
    pub async fn download(&self, url: &Url, destination: &Path) -> DownloadResult {
        if let Some(size) = self.existing_valid_size(destination).await {
            debug!(bytes = size, "valid file already present, skipping request");
            return DownloadResult::stored(destination.to_path_buf(), size, 0);
        }

        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 1;

        loop {
            self.rate_limiter.acquire(url.as_str()).await;

            let error = match self
                .client
                .fetch_to_path(url, destination, self.min_valid_bytes)
                .await
            {
                Ok(bytes) => {
                    info!(bytes, attempt, "asset stored");
                    return DownloadResult::stored(destination.to_path_buf(), bytes, attempt);
                }
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            match self.policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    let delay = match server_retry_after(&error) {
                        Some(server_delay) => {
                            self.rate_limiter.defer(url.as_str(), server_delay).await;
                            delay.max(server_delay)
                        }
                        None => delay,
                    };
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "download attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    let failure = final_reason(&error, failure_type, attempt, max_attempts);
                    warn!(
                        attempt,
                        failure = %failure,
                        reason = %reason,
                        error = %error,
                        "download failed"
                    );
                    return DownloadResult::failed(destination.to_path_buf(), failure, attempt, &error);
                }
            }
        }
    }

    async fn existing_valid_size(&self, destination: &Path) -> Option<u64> {
        let metadata = tokio::fs::metadata(destination).await.ok()?;
        let size = metadata.len();
        (metadata.is_file() && size > 0 && size >= self.min_valid_bytes).then_some(size)
    }
}

/// A multi-attempt budget consumed by retryable failures reports
/// `ExhaustedRetries`; otherwise the specific cause of the last attempt.
fn final_reason(
    error: &DownloadError,
    failure_type: FailureType,
    attempt: u32,
    max_attempts: u32,
) -> FailureReason {
    if max_attempts > 1 && attempt >= max_attempts && failure_type.is_retryable() {
        FailureReason::ExhaustedRetries
    } else {
        FailureReason::from(error)
    }
}

fn server_retry_after(error: &DownloadError) -> Option<std::time::Duration> {
    match error {
        DownloadError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}
