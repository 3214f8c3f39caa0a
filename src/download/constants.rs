//! Defaults for timeouts, validation and pacing.

use std::time::Duration;

/// Default connect timeout for asset downloads.
pub const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default per-read timeout for asset downloads (a stalled stream fails after this).
pub const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connect timeout for listing and detail pages.
pub const PAGE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default total timeout for listing and detail pages.
pub const PAGE_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default validation floor: payloads below this are treated as placeholders.
pub const DEFAULT_MIN_VALID_BYTES: u64 = 1024;

/// Default minimum delay between two requests to the same host.
pub const DEFAULT_POLITENESS_DELAY: Duration = Duration::from_millis(1000);

/// Warning threshold for cumulative politeness delay per host.
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum honoured Retry-After value.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Suffix appended to the destination file name while a download is in flight.
pub const TEMP_SUFFIX: &str = ".part";
