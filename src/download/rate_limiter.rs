//! Per-host politeness pacing shared by page fetches and asset downloads.
//!
//! Every outbound request calls [`RateLimiter::acquire`] first. Requests to
//! the same host are spaced at least `min_delay` apart no matter which worker
//! issues them; different hosts never wait on each other.
//!
//! ```
//! use std::time::Duration;
//! use harvester_core::download::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_millis(500));
//! limiter.acquire("https://example.com/listing?page=1").await; // immediate
//! limiter.acquire("https://example.com/listing?page=2").await; // waits ~500ms
//! limiter.acquire("https://cdn.example.net/a.mp3").await;      // immediate
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Host-keyed request pacer. Share it behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    disabled: bool,
    // Arc'd so the shard lock is released before awaiting the inner mutex.
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug)]
struct HostState {
    /// Earliest instant the next request may start. `None` until the first request.
    next_allowed: Mutex<Option<Instant>>,
    waited_ms: AtomicU64,
}

impl HostState {
    fn new() -> Self {
        Self {
            next_allowed: Mutex::new(None),
            waited_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_wait(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self.waited_ms.fetch_add(delay_ms, Ordering::SeqCst) + delay_ms;
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    /// Creates a limiter enforcing `min_delay` between requests to one host.
    #[must_use]
    pub fn new(min_delay: Duration) -> Self {
        debug!(delay_ms = min_delay.as_millis(), "creating rate limiter");
        Self {
            min_delay,
            disabled: min_delay.is_zero(),
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            min_delay: Duration::ZERO,
            disabled: true,
            hosts: DashMap::new(),
        }
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured spacing.
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    fn state_for(&self, host: &str) -> Arc<HostState> {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostState::new()))
            .clone()
    }

    /// Waits until a request to `url`'s host is allowed, then reserves the slot.
    #[instrument(skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        let host = extract_host(url);
        tracing::Span::current().record("host", host.as_str());

        // A deferral from Retry-After applies even when spacing is disabled.
        let state = self.state_for(&host);
        let mut next_allowed = state.next_allowed.lock().await;

        if let Some(at) = *next_allowed {
            let now = Instant::now();
            if at > now {
                let delay = at - now;
                let total = state.add_wait(delay);
                debug!(host = %host, delay_ms = delay.as_millis(), total_ms = total.as_millis(), "pacing request");
                if total >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        host = %host,
                        total_secs = total.as_secs(),
                        "heavy pacing for host - consider a smaller target count"
                    );
                }
                tokio::time::sleep(delay).await;
            }
        }

        let spacing = if self.disabled {
            Duration::ZERO
        } else {
            self.min_delay
        };
        *next_allowed = Some(Instant::now() + spacing);
    }

    /// Pushes the next allowed request to `url`'s host at least `delay` into
    /// the future (server-mandated Retry-After).
    #[instrument(skip(self), fields(host))]
    pub async fn defer(&self, url: &str, delay: Duration) {
        let host = extract_host(url);
        tracing::Span::current().record("host", host.as_str());

        let state = self.state_for(&host);
        let mut next_allowed = state.next_allowed.lock().await;
        let candidate = Instant::now() + delay.min(MAX_RETRY_AFTER);
        if next_allowed.is_none_or(|at| at < candidate) {
            *next_allowed = Some(candidate);
        }
        debug!(host = %host, delay_ms = delay.as_millis(), "host deferred by server");
    }
}

/// Returns the lowercased `host[:port]` key for `url`, or `"unknown"`.
///
/// ```
/// use harvester_core::download::rate_limiter::extract_host;
///
/// assert_eq!(extract_host("https://Example.COM/a.mp3"), "example.com");
/// assert_eq!(extract_host("http://127.0.0.1:8080/x"), "127.0.0.1:8080");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|host| match u.port() {
                Some(port) => format!("{}:{port}", host.to_lowercase()),
                None => host.to_lowercase(),
            })
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After value (delta seconds or HTTP-date), capped at one hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let at = httpdate::parse_http_date(header_value).ok()?;
    Some(
        at.duration_since(std::time::SystemTime::now())
            .unwrap_or(Duration::ZERO)
            .min(MAX_RETRY_AFTER),
    )
}
