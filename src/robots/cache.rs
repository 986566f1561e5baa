//! Robots.txt caching implementation
//!
//! Entries live for the lifetime of the owning policy; there is no expiry.

use crate::robots::ParsedRobots;
use std::collections::HashMap;

/// Cached robots.txt outcome for one origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed directives (unrestricted when unreachable)
    pub content: ParsedRobots,

    /// Whether the robots file was actually retrieved
    pub reachable: bool,
}

impl CachedRobots {
    /// Creates an entry for a successfully retrieved robots file
    pub fn fetched(content: ParsedRobots) -> Self {
        Self {
            content,
            reachable: true,
        }
    }

    /// Creates a fail-open entry for an origin whose robots file could not be read
    pub fn unreachable() -> Self {
        Self {
            content: ParsedRobots::unrestricted(),
            reachable: false,
        }
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }

    /// Gets the crawl delay from the cached robots.txt, in seconds
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.content.crawl_delay(user_agent)
    }
}

/// Origin-keyed robots cache
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, origin: &str) -> Option<&CachedRobots> {
        self.entries.get(origin)
    }

    pub fn insert(&mut self, origin: String, entry: CachedRobots) {
        self.entries.insert(origin, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
