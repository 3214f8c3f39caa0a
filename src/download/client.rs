//! HTTP client wrapper that streams one asset into a validated file.
//!
//! Bytes are streamed to `<destination>.part` and only renamed onto the final
//! name once the payload passed validation, so a crash or cancellation never
//! leaves a truncated file under a name the catalog or a rerun would trust.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::error::DownloadError;
use super::filename::temp_path_for;

/// Leading bytes inspected when sniffing for an HTML document.
const HTML_SNIFF_LEN: usize = 14;

/// Streaming HTTP client for asset payloads.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client with a connect timeout, a per-read timeout and a User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Performs one GET of `url` and stores the validated body at `destination`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::HttpStatus`] for non-2xx responses
    /// - [`DownloadError::InvalidContent`] when an HTML page comes back
    /// - [`DownloadError::TooSmall`] when the body is below `min_valid_bytes` (or empty)
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] on transport failures
    /// - [`DownloadError::Io`] when the temp file cannot be written or renamed
    #[instrument(skip(self, destination), fields(url = %url))]
    pub async fn fetch_to_path(
        &self,
        url: &Url,
        destination: &Path,
        min_valid_bytes: u64,
    ) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url.as_str(),
                status.as_u16(),
                retry_after,
            ));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            && is_html(content_type)
        {
            return Err(DownloadError::invalid_content(url.as_str(), content_type));
        }

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let temp_path = temp_path_for(destination);
        let streamed = stream_to_file(response, url, &temp_path).await;
        let bytes = match streamed {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %temp_path.display(), "removing partial file after error");
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(error);
            }
        };

        if bytes == 0 || bytes < min_valid_bytes {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(DownloadError::too_small(url.as_str(), bytes, min_valid_bytes));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, destination).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(DownloadError::io(destination, e));
        }

        debug!(path = %destination.display(), bytes, "payload stored");
        Ok(bytes)
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Whether a payload starts like an HTML document, whatever its Content-Type said.
fn looks_like_html(head: &[u8]) -> bool {
    let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let head = &head[start..];
    let prefix = head[..head.len().min(HTML_SNIFF_LEN)].to_ascii_lowercase();
    prefix.starts_with(b"<!doctype html") || prefix.starts_with(b"<html")
}

async fn stream_to_file(
    response: reqwest::Response,
    url: &Url,
    temp_path: &Path,
) -> Result<u64, DownloadError> {
    let file = File::create(temp_path)
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::network(url.as_str(), e))?;
        if bytes_written == 0 && looks_like_html(&chunk) {
            return Err(DownloadError::invalid_content(
                url.as_str(),
                "text/html (detected in body)",
            ));
        }
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;

    Ok(bytes_written)
}
