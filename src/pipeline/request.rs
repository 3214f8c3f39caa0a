//! What a run should acquire and where to put it.

use std::path::PathBuf;

use url::Url;

use crate::catalog::WriteMode;
use crate::config::ConfigError;

/// Smallest accepted target count.
pub const MIN_COUNT: usize = 50;

/// Largest accepted target count.
pub const MAX_COUNT: usize = 1000;

/// Placeholder replaced by the URL-encoded keyword in a listing template.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Inputs of one acquisition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    /// Listing pages to crawl, in order. One per keyword when built from a template.
    pub listing_urls: Vec<Url>,
    /// Number of assets to aim for across all listings.
    pub count: usize,
    /// Directory that receives the downloaded files.
    pub output_dir: PathBuf,
    /// CSV catalog location.
    pub catalog_path: PathBuf,
    /// Whether an existing catalog is replaced or extended.
    pub write_mode: WriteMode,
}

impl AcquisitionRequest {
    /// Creates a request over explicit listing URLs.
    #[must_use]
    pub fn new(
        listing_urls: Vec<Url>,
        count: usize,
        output_dir: impl Into<PathBuf>,
        catalog_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            listing_urls,
            count,
            output_dir: output_dir.into(),
            catalog_path: catalog_path.into(),
            write_mode: WriteMode::Truncate,
        }
    }

    /// Builds one listing URL per keyword by substituting `{query}` in `template`.
    ///
    /// A template without the placeholder is crawled once as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no non-blank keyword is given, the template
    /// does not produce a valid http(s) URL, or `count` is out of range.
    pub fn from_keywords<I, S>(
        template: &str,
        keywords: I,
        count: usize,
        output_dir: impl Into<PathBuf>,
        catalog_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(ConfigError::invalid("keywords", "at least one keyword is required"));
        }
        if template.trim().is_empty() {
            return Err(ConfigError::invalid("listing_url", "a listing URL template is required"));
        }

        let mut listing_urls: Vec<Url> = Vec::new();
        if template.contains(QUERY_PLACEHOLDER) {
            for keyword in &keywords {
                let url = listing_url(&template.replace(QUERY_PLACEHOLDER, &urlencoding::encode(keyword)))?;
                if !listing_urls.contains(&url) {
                    listing_urls.push(url);
                }
            }
        } else {
            listing_urls.push(listing_url(template)?);
        }

        let request = Self::new(listing_urls, count, output_dir, catalog_path);
        request.validate()?;
        Ok(request)
    }

    /// Sets the catalog write mode.
    #[must_use]
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Checks the count range and that there is something to crawl.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_COUNT..=MAX_COUNT).contains(&self.count) {
            return Err(ConfigError::out_of_range("count", self.count, "50..=1000"));
        }
        if self.listing_urls.is_empty() {
            return Err(ConfigError::invalid("listing_url", "no listing page to crawl"));
        }
        Ok(())
    }
}

fn listing_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::invalid("listing_url", format!("'{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            "listing_url",
            format!("'{raw}' is not an http(s) URL"),
        ));
    }
    Ok(url)
}
