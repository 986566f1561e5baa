//! Robots.txt parser implementation
//!
//! Rule matching is delegated to the robotstxt crate; `Crawl-delay` is not
//! covered by it and is parsed here.

use robotstxt::DefaultMatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rules {
    /// No restrictions (missing or unreadable robots file)
    Unrestricted,
    /// Everything disallowed (robots file answered 401/403)
    DisallowAll,
    /// Raw robots.txt body evaluated on demand
    Content(String),
}

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRobots {
    rules: Rules,
}

impl ParsedRobots {
    /// Creates a ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            rules: Rules::Content(content.to_string()),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is what an origin gets when its robots.txt cannot be fetched.
    pub fn unrestricted() -> Self {
        Self {
            rules: Rules::Unrestricted,
        }
    }

    /// Creates a ParsedRobots that disallows everything
    pub fn disallow_all() -> Self {
        Self {
            rules: Rules::DisallowAll,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL (or path) to check
    /// * `user_agent` - The user agent string
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.rules {
            Rules::Unrestricted => true,
            Rules::DisallowAll => false,
            Rules::Content(content) if content.trim().is_empty() => true,
            Rules::Content(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent wins over the `*` group.
    ///
    /// # Returns
    ///
    /// * `Some(f64)` - The crawl delay in seconds
    /// * `None` - If no crawl delay applies
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let content = match &self.rules {
            Rules::Content(content) => content,
            _ => return None,
        };

        let agent = user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_has_rules = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for line in content.lines() {
            // Strip trailing comments
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A user-agent line after rules opens a new group
                    if group_has_rules {
                        group.clear();
                        group_has_rules = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_has_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if delay < 0.0 {
                        continue;
                    }
                    for ua in &group {
                        if ua == "*" {
                            wildcard_delay = Some(delay);
                        } else if !ua.is_empty() && agent.contains(ua.as_str()) {
                            agent_delay = Some(delay);
                        }
                    }
                }
                _ => group_has_rules = true,
            }
        }

        agent_delay.or(wildcard_delay)
    }
}
