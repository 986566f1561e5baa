use crate::config::types::{Config, CrawlerConfig, FetcherConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seeds(&config.seeds)?;
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates seed URLs
pub fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if !config.min_crawl_delay_secs.is_finite() || config.min_crawl_delay_secs < 0.0 {
        return Err(ConfigError::Validation(format!(
            "min_crawl_delay_secs must be a non-negative number, got {}",
            config.min_crawl_delay_secs
        )));
    }

    if config.interval_hours == 0 {
        return Err(ConfigError::Validation(
            "interval_hours must be >= 1".to_string(),
        ));
    }

    if config.seed_link_limit == 0 || config.link_limit == 0 {
        return Err(ConfigError::Validation(format!(
            "link limits must be >= 1, got seed={} other={}",
            config.seed_link_limit, config.link_limit
        )));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.static_timeout_secs == 0 || config.render_timeout_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "fetch timeouts must be >= 1s, got static={} render={}",
            config.static_timeout_secs, config.render_timeout_secs
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
