//! Crawler module for page fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - Static HTTP fetching and headless browser rendering
//! - Link extraction and same-site filtering
//! - Depth-bounded traversal with politeness delays
//! - Periodic and manual scheduling of seed crawls

mod engine;
mod fetcher;
mod links;
mod renderer;
mod scheduler;

pub use engine::CrawlEngine;
pub use fetcher::{build_http_client, Fetcher};
pub use links::{extract_links, is_followable};
pub use renderer::{ChromiumRenderer, PageRenderer, RenderError};
pub use scheduler::CrawlScheduler;
