use serde::Deserialize;

/// Browser-like user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for Record-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seed URLs crawled by the scheduler
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub fetcher: FetcherConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeds: default_seeds(),
            crawler: CrawlerConfig::default(),
            fetcher: FetcherConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// How the robots policy treats an explicit disallow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotsMode {
    /// Disallowed URLs are crawled anyway, with a warning
    #[default]
    Permissive,
    /// Disallowed URLs are skipped
    Strict,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed URLs
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Minimum time between requests to the same domain (seconds)
    #[serde(default = "default_min_crawl_delay")]
    pub min_crawl_delay_secs: f64,

    /// Hours between scheduled crawls of the same seed
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Pages at this depth or shallower are fetched through the browser
    #[serde(default = "default_render_depth")]
    pub render_depth: u32,

    /// Maximum links followed from a seed page
    #[serde(default = "default_seed_link_limit")]
    pub seed_link_limit: usize,

    /// Maximum links followed from any deeper page
    #[serde(default = "default_link_limit")]
    pub link_limit: usize,

    #[serde(default)]
    pub robots_mode: RobotsMode,

    /// Run a forced crawl as soon as the scheduler starts
    #[serde(default)]
    pub run_on_start: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            min_crawl_delay_secs: default_min_crawl_delay(),
            interval_hours: default_interval_hours(),
            render_depth: default_render_depth(),
            seed_link_limit: default_seed_link_limit(),
            link_limit: default_link_limit(),
            robots_mode: RobotsMode::default(),
            run_on_start: false,
        }
    }
}

/// Page fetching configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetcherConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a plain HTTP fetch (seconds)
    #[serde(default = "default_static_timeout")]
    pub static_timeout_secs: u64,

    /// Wall-clock limit for one rendered fetch (seconds)
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    /// Extra wait after navigation for client-side rendering (milliseconds)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Whether the headless browser may be used at all
    #[serde(default = "default_true")]
    pub rendering: bool,

    /// Explicit Chrome/Chromium binary; autodetected when unset
    #[serde(default)]
    pub chrome_executable: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            static_timeout_secs: default_static_timeout(),
            render_timeout_secs: default_render_timeout(),
            settle_delay_ms: default_settle_delay(),
            rendering: true,
            chrome_executable: None,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Lifetime of cached search responses (hours)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            cache_ttl_hours: default_cache_ttl(),
        }
    }
}

fn default_seeds() -> Vec<String> {
    vec!["https://www.biek.edu.pk/default.asp".to_string()]
}

fn default_max_depth() -> u32 {
    3
}

fn default_min_crawl_delay() -> f64 {
    2.0
}

fn default_interval_hours() -> u64 {
    24
}

fn default_render_depth() -> u32 {
    1
}

fn default_seed_link_limit() -> usize {
    100
}

fn default_link_limit() -> usize {
    50
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_static_timeout() -> u64 {
    30
}

fn default_render_timeout() -> u64 {
    90
}

fn default_settle_delay() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> String {
    "./public_information.db".to_string()
}

fn default_cache_ttl() -> u64 {
    24
}
