//! Robots.txt handling module
//!
//! This module fetches, parses and caches robots.txt files per origin and
//! answers the two questions the crawl engine asks: may this URL be
//! fetched, and how long to wait between requests to its domain.
//!
//! Unavailable robots files fail open. An explicit disallow is honored or
//! overridden depending on the configured [`RobotsMode`].

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use crate::config::RobotsMode;
use reqwest::{Client, StatusCode};
use std::error::Error as _;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Delay used when a robots file declares no `Crawl-delay`
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(1);

/// Per-origin robots.txt policy
///
/// Each origin's robots file is requested at most once per policy
/// instance. The cache lock is held across the fetch so concurrent
/// callers for the same origin share one request.
pub struct RobotsPolicy {
    client: Client,
    mode: RobotsMode,
    cache: Mutex<RobotsCache>,
}

impl RobotsPolicy {
    /// Creates a new policy using `client` for robots requests
    pub fn new(client: Client, mode: RobotsMode) -> Self {
        Self {
            client,
            mode,
            cache: Mutex::new(RobotsCache::new()),
        }
    }

    /// Decides whether `url` may be fetched by `user_agent`
    ///
    /// # Returns
    ///
    /// * `true` - The URL is allowed, the robots file is unavailable, or the
    ///   disallow is overridden in permissive mode
    /// * `false` - The URL is disallowed and the mode is strict
    pub async fn can_fetch(&self, url: &str, user_agent: &str) -> bool {
        let Some(parsed) = parse_http_url(url) else {
            tracing::debug!("Cannot evaluate robots for {}, allowing", url);
            return true;
        };

        let entry = self.directives(&parsed).await;
        if entry.is_allowed(parsed.as_str(), user_agent) {
            return true;
        }

        match self.mode {
            RobotsMode::Permissive => {
                tracing::warn!(
                    "robots.txt disallows {}, crawling anyway (permissive mode)",
                    url
                );
                true
            }
            RobotsMode::Strict => {
                tracing::info!("robots.txt disallows {}, skipping", url);
                false
            }
        }
    }

    /// Returns the crawl delay that applies to `url` for `user_agent`
    ///
    /// Falls back to [`DEFAULT_CRAWL_DELAY`] when none is declared or the
    /// robots file is unavailable.
    pub async fn crawl_delay(&self, url: &str, user_agent: &str) -> Duration {
        let Some(parsed) = parse_http_url(url) else {
            return DEFAULT_CRAWL_DELAY;
        };

        self.directives(&parsed)
            .await
            .crawl_delay(user_agent)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(DEFAULT_CRAWL_DELAY)
    }

    /// Returns whether the robots file for `url`'s origin was retrieved,
    /// or None if it has not been requested yet
    pub async fn is_reachable(&self, url: &str) -> Option<bool> {
        let parsed = parse_http_url(url)?;
        let cache = self.cache.lock().await;
        cache.get(&origin_key(&parsed)).map(|entry| entry.reachable)
    }

    /// Gets the cached directives for the URL's origin, fetching them first
    /// if needed
    async fn directives(&self, url: &Url) -> CachedRobots {
        let origin = origin_key(url);
        let mut cache = self.cache.lock().await;

        if let Some(entry) = cache.get(&origin) {
            return entry.clone();
        }

        let entry = fetch_robots(&self.client, &origin).await;
        cache.insert(origin, entry.clone());
        entry
    }
}

/// Fetches and parses robots.txt for an origin
///
/// Never fails: any problem yields an unreachable (fail-open) entry.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `origin` - The origin, as `scheme://host[:port]`
pub async fn fetch_robots(client: &Client, origin: &str) -> CachedRobots {
    let robots_url = format!("{}/robots.txt", origin);

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            if is_dns_failure(&e) {
                tracing::debug!("robots.txt host not found for {}: {}", origin, e);
            } else {
                tracing::warn!("Failed to fetch {}: {}", robots_url, e);
            }
            return CachedRobots::unreachable();
        }
    };

    let status = response.status();
    match status {
        s if s.is_success() => match response.text().await {
            Ok(body) => {
                tracing::debug!("Fetched {} ({} bytes)", robots_url, body.len());
                CachedRobots::fetched(ParsedRobots::from_content(&body))
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", robots_url, e);
                CachedRobots::unreachable()
            }
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            tracing::debug!("{} answered {}, treating as disallow all", robots_url, status);
            CachedRobots::fetched(ParsedRobots::disallow_all())
        }
        StatusCode::NOT_FOUND => {
            tracing::debug!("No robots.txt at {}", origin);
            CachedRobots::unreachable()
        }
        _ => {
            tracing::warn!("Unexpected status {} for {}", status, robots_url);
            CachedRobots::unreachable()
        }
    }
}

/// Builds the cache key (`scheme://host[:port]`) for a URL
///
/// Default ports are omitted.
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

fn parse_http_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

fn is_dns_failure(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        let message = err.to_string().to_lowercase();
        if message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("name or service not known")
        {
            return true;
        }
        source = err.source();
    }
    false
}
