//! robots.txt rules with a per-origin cache.
//!
//! Only the `User-agent: *` group is honoured. `Allow` and `Disallow` are
//! matched as path prefixes and the longest match wins (ties go to `Allow`).
//! An unreachable or non-2xx robots.txt allows everything.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::download::RateLimiter;

/// Parsed rules for one origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    allow: Vec<String>,
    disallow: Vec<String>,
}

impl RobotsRules {
    /// Parses a robots.txt body.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut rules = Self::default();
        let mut in_wildcard_group = false;
        let mut previous_was_agent = false;

        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // Consecutive agent lines share one group.
                    if !previous_was_agent {
                        in_wildcard_group = false;
                    }
                    in_wildcard_group |= value == "*";
                    previous_was_agent = true;
                }
                "allow" | "disallow" => {
                    previous_was_agent = false;
                    if !in_wildcard_group || value.is_empty() {
                        continue;
                    }
                    let prefix = if value.starts_with('/') {
                        value.to_string()
                    } else {
                        format!("/{value}")
                    };
                    let list = if key == "allow" {
                        &mut rules.allow
                    } else {
                        &mut rules.disallow
                    };
                    if !list.contains(&prefix) {
                        list.push(prefix);
                    }
                }
                _ => previous_was_agent = false,
            }
        }
        rules
    }

    /// Returns whether `path` (path plus optional query) may be fetched.
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |prefixes: &[String]| {
            prefixes
                .iter()
                .filter(|p| path.starts_with(p.as_str()))
                .map(String::len)
                .max()
        };
        match (longest(&self.allow), longest(&self.disallow)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }
}

/// Per-origin robots.txt cache. Rules are fetched once per origin per run.
#[derive(Debug, Default)]
pub struct RobotsCache {
    origins: DashMap<String, Arc<RobotsRules>>,
}

impl RobotsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `url` may be fetched, loading the origin's rules on first use.
    #[instrument(skip(self, client, rate_limiter), fields(url = %url))]
    pub async fn allows(&self, client: &Client, rate_limiter: &RateLimiter, url: &Url) -> bool {
        let Some(origin) = origin_of(url) else {
            return true;
        };

        let cached = self.origins.get(&origin).map(|entry| Arc::clone(entry.value()));
        let rules = match cached {
            Some(rules) => rules,
            None => {
                let rules = Arc::new(fetch_rules(client, rate_limiter, &origin).await);
                self.origins.insert(origin.clone(), Arc::clone(&rules));
                rules
            }
        };

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        let allowed = rules.is_allowed(&target);
        if !allowed {
            debug!(origin = %origin, path = %target, "robots.txt disallows path");
        }
        allowed
    }
}

async fn fetch_rules(client: &Client, rate_limiter: &RateLimiter, origin: &str) -> RobotsRules {
    let robots_url = format!("{origin}/robots.txt");
    rate_limiter.acquire(&robots_url).await;

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(error) => {
            debug!(url = %robots_url, error = %error, "robots.txt unreachable, allowing all");
            return RobotsRules::default();
        }
    };
    if !response.status().is_success() {
        debug!(url = %robots_url, status = response.status().as_u16(), "no robots.txt, allowing all");
        return RobotsRules::default();
    }
    match response.text().await {
        Ok(body) => RobotsRules::parse(&body),
        Err(error) => {
            debug!(url = %robots_url, error = %error, "robots.txt body unreadable, allowing all");
            RobotsRules::default()
        }
    }
}

/// `scheme://host[:port]` of `url`.
#[must_use]
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}
