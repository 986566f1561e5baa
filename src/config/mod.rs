//! Configuration module for Record-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and layering environment overrides on top of them.
//!
//! # Example
//!
//! ```no_run
//! use record_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, FetcherConfig, RobotsMode, StorageConfig, DEFAULT_USER_AGENT,
};

pub use parser::{apply_env_overrides, apply_overrides_from, load_config, load_config_from_env};
pub use validation::{validate, validate_seeds};
