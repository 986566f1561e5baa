use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;
use std::str::FromStr;

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation,
/// so `CRAWL_INTERVAL_HOURS=6` wins over the file's `interval-hours`.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use record_sweep::config::load_config;
///
/// let config = load_config(Path::new("sweep.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config)?;
    validate(&config)?;

    Ok(config)
}

/// Builds a configuration from defaults plus environment overrides
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Applies process environment overrides to a configuration
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

/// Applies overrides read through `lookup`
///
/// Recognized variables:
///
/// | Variable | Field |
/// |----------|-------|
/// | `CRAWL_INTERVAL_HOURS` | `crawler.interval-hours` |
/// | `CRAWL_DELAY_SECONDS` | `crawler.min-crawl-delay-secs` |
/// | `MAX_CRAWL_DEPTH` | `crawler.max-depth` |
/// | `DATABASE_PATH` | `storage.database-path` |
/// | `DATABASE_NAME` | `storage.database-path` as `<name>.db`, when `DATABASE_PATH` is unset |
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(hours) = parse_var(&lookup, "CRAWL_INTERVAL_HOURS")? {
        config.crawler.interval_hours = hours;
    }

    if let Some(delay) = parse_var(&lookup, "CRAWL_DELAY_SECONDS")? {
        config.crawler.min_crawl_delay_secs = delay;
    }

    if let Some(depth) = parse_var(&lookup, "MAX_CRAWL_DEPTH")? {
        config.crawler.max_depth = depth;
    }

    match lookup("DATABASE_PATH").filter(|v| !v.trim().is_empty()) {
        Some(path) => config.storage.database_path = path,
        None => {
            if let Some(name) = lookup("DATABASE_NAME").filter(|v| !v.trim().is_empty()) {
                config.storage.database_path = format!("{}.db", name.trim());
            }
        }
    }

    Ok(())
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}
