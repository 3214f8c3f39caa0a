//! Error types for the download module.
//!
//! These errors never escape [`AssetDownloader::download`](super::AssetDownloader::download):
//! they drive retry decisions and are folded into a
//! [`DownloadResult`](super::DownloadResult) failure reason.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during a single download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset mid-stream, ...).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// Payload smaller than the validation floor.
    #[error("payload from {url} is {bytes} bytes, below the {min_bytes}-byte floor")]
    TooSmall {
        /// The URL whose payload was rejected.
        url: String,
        /// Bytes received.
        bytes: u64,
        /// Configured floor.
        min_bytes: u64,
    },

    /// The server answered a media request with an HTML page.
    #[error("expected media from {url} but received {content_type}")]
    InvalidContent {
        /// The URL whose payload was rejected.
        url: String,
        /// The offending Content-Type.
        content_type: String,
    },

    /// Local file system error (create temp file, write, rename).
    #[error("IO error writing to {}: {source}", path.display())]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a validation-floor error.
    pub fn too_small(url: impl Into<String>, bytes: u64, min_bytes: u64) -> Self {
        Self::TooSmall {
            url: url.into(),
            bytes,
            min_bytes,
        }
    }

    /// Creates a wrong-content-type error.
    pub fn invalid_content(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::InvalidContent {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/a.mp3");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/a.mp3"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let msg = DownloadError::http_status("https://example.com/a.mp3", 404).to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/a.mp3"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_download_error_too_small_display() {
        let msg = DownloadError::too_small("https://example.com/a.jpg", 512, 1024).to_string();
        assert!(msg.contains("512"), "Expected byte count in: {msg}");
        assert!(msg.contains("1024"), "Expected floor in: {msg}");
    }

    #[test]
    fn test_download_error_invalid_content_display() {
        let msg = DownloadError::invalid_content("https://example.com/a.jpg", "text/html").to_string();
        assert!(msg.contains("text/html"), "Expected content type in: {msg}");
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let msg = DownloadError::io(PathBuf::from("/tmp/a.mp3"), io_error).to_string();
        assert!(msg.contains("/tmp/a.mp3"), "Expected path in: {msg}");
    }
}
