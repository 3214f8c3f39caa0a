//! Merges CLI flags, the config file and defaults into one run configuration.
//!
//! Precedence: CLI flag > config file > built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::catalog::WriteMode;
use harvester_core::config::{
    ConfigError, CrawlerConfig, FileConfig, SiteConfig, load_default_file_config, load_file_config,
};
use harvester_core::pipeline::AcquisitionRequest;
use tracing::debug;

use crate::cli::FetchArgs;

/// Catalog file name used when neither flag nor config names one.
pub(crate) const DEFAULT_CATALOG_NAME: &str = "annotations.csv";

/// Everything an acquisition run needs.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) crawler: CrawlerConfig,
    pub(crate) site: SiteConfig,
    pub(crate) request: AcquisitionRequest,
}

/// Loads the config file (explicit path or default location) and merges it with `args`.
pub(crate) fn resolve_settings(args: &FetchArgs) -> Result<RunSettings> {
    let file = load_config(args.config.as_deref())?;
    build_settings(args, file.as_ref()).context("invalid configuration")
}

fn load_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        debug!(path = %path.display(), "loaded config file");
        return Ok(Some(config));
    }
    let loaded = load_default_file_config()?;
    if let Some((path, _)) = &loaded {
        debug!(path = %path.display(), "loaded default config file");
    }
    Ok(loaded.map(|(_, config)| config))
}

/// Pure merge of flags and file values.
pub(crate) fn build_settings(
    args: &FetchArgs,
    file: Option<&FileConfig>,
) -> Result<RunSettings, ConfigError> {
    let mut crawler = CrawlerConfig::default();
    if let Some(file) = file {
        crawler = crawler.with_file(file);
    }
    if let Some(v) = args.concurrency {
        crawler.concurrency = usize::from(v);
    }
    if let Some(v) = args.max_attempts {
        crawler.max_attempts = u32::from(v);
    }
    if let Some(v) = args.delay_ms {
        crawler.politeness_delay = Duration::from_millis(v);
    }
    if let Some(v) = args.min_bytes {
        crawler.min_valid_bytes = v;
    }
    if let Some(v) = args.max_pages {
        crawler.max_pages = usize::try_from(v).unwrap_or(usize::MAX);
    }
    if args.check_robots {
        crawler.check_robots = true;
    }
    crawler.validate()?;

    let mut site = file.map(|f| f.site.clone()).unwrap_or_default();
    if let Some(listing_url) = &args.listing_url {
        site.listing_url = Some(listing_url.clone());
    }
    let template = site.listing_url.clone().ok_or_else(|| {
        ConfigError::invalid(
            "listing_url",
            "pass --listing-url or set [site] listing_url in the config file",
        )
    })?;

    let count = args
        .count
        .ok_or_else(|| ConfigError::invalid("count", "--count is required (50..=1000)"))?;

    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| file.and_then(|f| f.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));
    let catalog_path = args
        .annotation_file
        .clone()
        .or_else(|| file.and_then(|f| f.annotation_file.clone()))
        .unwrap_or_else(|| output_dir.join(DEFAULT_CATALOG_NAME));

    let write_mode = if args.merge {
        WriteMode::Merge
    } else {
        WriteMode::Truncate
    };
    let request = AcquisitionRequest::from_keywords(
        &template,
        &args.keywords,
        usize::from(count),
        output_dir,
        catalog_path,
    )?
    .with_write_mode(write_mode);

    Ok(RunSettings {
        crawler,
        site,
        request,
    })
}
