//! Crawler tunables and the optional TOML config file.
//!
//! [`CrawlerConfig`] carries every value the pipeline needs. It starts from
//! [`Default`], is overlaid with a [`FileConfig`] when one is present, and the
//! binary applies command-line flags last (flag > file > default).

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::download::constants::{
    DEFAULT_MIN_VALID_BYTES, DEFAULT_POLITENESS_DELAY, DOWNLOAD_CONNECT_TIMEOUT,
    DOWNLOAD_READ_TIMEOUT, PAGE_CONNECT_TIMEOUT, PAGE_READ_TIMEOUT,
};
use crate::download::{Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_JITTER, RetryPolicy};
use crate::urls::AssetExtensions;
use crate::user_agent::default_user_agent;

/// Lowest accepted worker count.
pub const MIN_CONCURRENCY: usize = 1;
/// Highest accepted worker count.
pub const MAX_CONCURRENCY: usize = 8;
/// Worker count when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 3;
/// Listing pages visited per keyword when none is configured.
pub const DEFAULT_MAX_PAGES: usize = 50;
/// Highest accepted attempt budget.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;
/// Longest accepted politeness delay.
const MAX_POLITENESS_DELAY: Duration = Duration::from_secs(60);
/// Accepted timeout range in seconds.
const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=3600;

/// Invalid configuration. Always fatal: raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric value outside its accepted range.
    #[error("invalid value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Config field name.
        field: &'static str,
        /// Offending value, rendered.
        value: String,
        /// Accepted range, rendered.
        expected: &'static str,
    },

    /// A value that is present but unusable.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Config field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A selector regex that does not compile.
    #[error("invalid regex for `{field}`: {source}")]
    InvalidPattern {
        /// Config field name.
        field: &'static str,
        /// Compile error.
        #[source]
        source: regex::Error,
    },

    /// The config file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// TOML error (carries line and column).
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Creates an out-of-range error.
    pub fn out_of_range(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }

    /// Creates an invalid-value error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Every tunable of a crawl, resolve and download run.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Connect timeout for listing and detail pages.
    pub page_connect_timeout: Duration,
    /// Total timeout for listing and detail pages.
    pub page_read_timeout: Duration,
    /// Connect timeout for asset downloads.
    pub download_connect_timeout: Duration,
    /// Per-read timeout for asset downloads.
    pub download_read_timeout: Duration,
    /// Attempt budget per asset (initial attempt included).
    pub max_attempts: u32,
    /// Wait schedule between attempts.
    pub backoff: Backoff,
    /// Upper bound of random jitter added to each retry delay.
    pub max_jitter: Duration,
    /// Concurrent download workers.
    pub concurrency: usize,
    /// Minimum spacing between requests to one host. Zero turns pacing off
    /// and is meant for local servers and tests; the pipeline warns when it
    /// starts unpaced.
    pub politeness_delay: Duration,
    /// Payloads smaller than this are rejected.
    pub min_valid_bytes: u64,
    /// Listing pages visited per starting URL.
    pub max_pages: usize,
    /// Extensions treated as direct media links.
    pub asset_extensions: AssetExtensions,
    /// User-Agent for every request.
    pub user_agent: String,
    /// Honour robots.txt for pages and assets.
    pub check_robots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_connect_timeout: PAGE_CONNECT_TIMEOUT,
            page_read_timeout: PAGE_READ_TIMEOUT,
            download_connect_timeout: DOWNLOAD_CONNECT_TIMEOUT,
            download_read_timeout: DOWNLOAD_READ_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            max_jitter: DEFAULT_MAX_JITTER,
            concurrency: DEFAULT_CONCURRENCY,
            politeness_delay: DEFAULT_POLITENESS_DELAY,
            min_valid_bytes: DEFAULT_MIN_VALID_BYTES,
            max_pages: DEFAULT_MAX_PAGES,
            asset_extensions: AssetExtensions::default(),
            user_agent: default_user_agent(),
            check_robots: false,
        }
    }
}

impl CrawlerConfig {
    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::out_of_range(
                "concurrency",
                self.concurrency,
                "1..=8",
            ));
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(ConfigError::out_of_range(
                "max_attempts",
                self.max_attempts,
                "1..=10",
            ));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::out_of_range("max_pages", 0, "1.."));
        }
        if self.politeness_delay > MAX_POLITENESS_DELAY {
            return Err(ConfigError::out_of_range(
                "delay_ms",
                self.politeness_delay.as_millis(),
                "0..=60000",
            ));
        }
        for (field, timeout) in [
            ("page_connect_timeout_secs", self.page_connect_timeout),
            ("page_read_timeout_secs", self.page_read_timeout),
            ("download_connect_timeout_secs", self.download_connect_timeout),
            ("download_read_timeout_secs", self.download_read_timeout),
        ] {
            if timeout.is_zero() || timeout > Duration::from_secs(*TIMEOUT_RANGE_SECS.end()) {
                return Err(ConfigError::out_of_range(
                    field,
                    format!("{timeout:?}"),
                    "1..=3600 seconds",
                ));
            }
        }
        if let Backoff::Exponential { multiplier, .. } = self.backoff
            && !(multiplier >= 1.0 && multiplier.is_finite())
        {
            return Err(ConfigError::invalid(
                "backoff_multiplier",
                format!("{multiplier} must be a finite value >= 1.0"),
            ));
        }
        if self.asset_extensions.is_empty() {
            return Err(ConfigError::invalid(
                "extensions",
                "at least one asset extension is required",
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }
        Ok(())
    }

    /// Retry policy derived from the attempt budget, backoff and jitter.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff, self.max_jitter)
    }

    /// Overlays every value set in `file` onto `self`.
    #[must_use]
    pub fn with_file(mut self, file: &FileConfig) -> Self {
        if let Some(v) = file.concurrency {
            self.concurrency = v;
        }
        if let Some(v) = file.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = file.delay_ms {
            self.politeness_delay = Duration::from_millis(v);
        }
        if let Some(v) = file.min_bytes {
            self.min_valid_bytes = v;
        }
        if let Some(v) = file.max_pages {
            self.max_pages = v;
        }
        if let Some(v) = file.check_robots {
            self.check_robots = v;
        }
        if let Some(v) = &file.extensions {
            self.asset_extensions = AssetExtensions::new(v);
        }
        if let Some(v) = &file.user_agent {
            self.user_agent.clone_from(v);
        }
        if let Some(v) = file.page_connect_timeout_secs {
            self.page_connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.page_read_timeout_secs {
            self.page_read_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.download_connect_timeout_secs {
            self.download_connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.download_read_timeout_secs {
            self.download_read_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.jitter_ms {
            self.max_jitter = Duration::from_millis(v);
        }
        self.backoff = file.backoff(self.backoff);
        self
    }
}

/// Backoff shape as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Growing delay.
    Exponential,
    /// Constant delay.
    Fixed,
}

/// Site-specific listing selector settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Listing URL template; `{query}` is replaced with the URL-encoded keyword.
    pub listing_url: Option<String>,
    /// Regex for candidate anchors. Capture 1 is the href, capture 2 (or `title`) the title.
    pub item_pattern: Option<String>,
    /// Only hrefs matching this regex become candidates.
    pub href_filter: Option<String>,
    /// Regex whose capture 1 is the next-page href.
    pub next_pattern: Option<String>,
    /// Paginate by incrementing this query parameter instead of following links.
    pub page_param: Option<String>,
}

/// Optional TOML config file. Every field may be omitted.
///
/// ```toml
/// output_dir = "data/dogs"
/// concurrency = 4
/// delay_ms = 1500
///
/// [site]
/// listing_url = "https://sounds.example.com/search?q={query}"
/// href_filter = "/sound/\\d+"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default catalog path.
    pub annotation_file: Option<PathBuf>,
    /// Concurrent download workers (1..=8).
    pub concurrency: Option<usize>,
    /// Attempt budget per asset (1..=10).
    pub max_attempts: Option<u32>,
    /// Per-host politeness delay in milliseconds.
    pub delay_ms: Option<u64>,
    /// Validation floor in bytes.
    pub min_bytes: Option<u64>,
    /// Listing pages per keyword.
    pub max_pages: Option<usize>,
    /// Honour robots.txt.
    pub check_robots: Option<bool>,
    /// Direct-asset extension allow-set.
    pub extensions: Option<Vec<String>>,
    /// User-Agent override.
    pub user_agent: Option<String>,
    /// Page connect timeout in seconds.
    pub page_connect_timeout_secs: Option<u64>,
    /// Page total timeout in seconds.
    pub page_read_timeout_secs: Option<u64>,
    /// Download connect timeout in seconds.
    pub download_connect_timeout_secs: Option<u64>,
    /// Download per-read timeout in seconds.
    pub download_read_timeout_secs: Option<u64>,
    /// `exponential` or `fixed`.
    pub backoff: Option<BackoffKind>,
    /// First (or fixed) retry delay in milliseconds.
    pub backoff_base_ms: Option<u64>,
    /// Cap for exponential delays in milliseconds.
    pub backoff_max_ms: Option<u64>,
    /// Growth factor for exponential delays, in tenths (20 = x2.0).
    pub backoff_multiplier_tenths: Option<u16>,
    /// Maximum jitter in milliseconds.
    pub jitter_ms: Option<u64>,
    /// Listing selector settings.
    pub site: SiteConfig,
}

impl FileConfig {
    /// Parses a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the values that can be checked without the rest of the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(v) = self.concurrency
            && !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&v)
        {
            return Err(ConfigError::out_of_range("concurrency", v, "1..=8"));
        }
        if let Some(v) = self.max_attempts
            && !(1..=MAX_ATTEMPTS_LIMIT).contains(&v)
        {
            return Err(ConfigError::out_of_range("max_attempts", v, "1..=10"));
        }
        if let Some(v) = self.delay_ms
            && v > 60_000
        {
            return Err(ConfigError::out_of_range("delay_ms", v, "0..=60000"));
        }
        for (field, value) in [
            ("page_connect_timeout_secs", self.page_connect_timeout_secs),
            ("page_read_timeout_secs", self.page_read_timeout_secs),
            ("download_connect_timeout_secs", self.download_connect_timeout_secs),
            ("download_read_timeout_secs", self.download_read_timeout_secs),
        ] {
            if let Some(v) = value
                && !TIMEOUT_RANGE_SECS.contains(&v)
            {
                return Err(ConfigError::out_of_range(field, v, "1..=3600"));
            }
        }
        if let Some(v) = self.backoff_multiplier_tenths
            && v < 10
        {
            return Err(ConfigError::out_of_range(
                "backoff_multiplier_tenths",
                v,
                "10..",
            ));
        }
        Ok(())
    }

    fn backoff(&self, current: Backoff) -> Backoff {
        let kind = self.backoff.unwrap_or(match current {
            Backoff::Fixed(_) => BackoffKind::Fixed,
            Backoff::Exponential { .. } => BackoffKind::Exponential,
        });
        let (base, max, multiplier) = match current {
            Backoff::Exponential {
                base,
                max,
                multiplier,
            } => (base, max, multiplier),
            Backoff::Fixed(delay) => (delay, delay, 1.0),
        };
        let base = self.backoff_base_ms.map_or(base, Duration::from_millis);
        match kind {
            BackoffKind::Fixed => Backoff::Fixed(base),
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                max: self.backoff_max_ms.map_or(max, Duration::from_millis),
                multiplier: self
                    .backoff_multiplier_tenths
                    .map_or(multiplier, |t| f32::from(t) / 10.0),
            },
        }
    }
}

/// Default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/harvester/config.toml`
/// 2. `$HOME/.config/harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join("harvester").join("config.toml"));
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("harvester")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Reads, parses and validates a config file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`], [`ConfigError::Parse`] or a validation error.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::from_toml_str(&raw, path)?;
    config.validate()?;
    Ok(config)
}

/// Loads the config file at the default location if it exists.
///
/// # Errors
///
/// Propagates [`load_file_config`] errors for a file that exists but is invalid.
pub fn load_default_file_config() -> Result<Option<(PathBuf, FileConfig)>, ConfigError> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let config = load_file_config(&path)?;
    Ok(Some((path, config)))
}
