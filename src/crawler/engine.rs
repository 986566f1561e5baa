//! Crawl engine
//!
//! Walks the link graph from a seed depth-first, using an explicit work
//! stack instead of recursion. Each visited URL owns a crawl job that is
//! marked `running` on entry and `completed` (with the page count of its
//! subtree) once all of its descendants are done.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::links::extract_links;
use crate::extract::RecordExtractor;
use crate::robots::RobotsPolicy;
use crate::storage::{save_record, CrawlJob, Storage};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One unit of traversal work
#[derive(Debug)]
enum Frame {
    /// Visit `url`; its page count is added to `parent` when finished
    Visit {
        url: String,
        depth: u32,
        parent: Option<usize>,
    },
    /// All children of `node` are done
    Finish { node: usize },
}

/// A page that was entered and whose subtree is still being counted
struct Node {
    job: CrawlJob,
    pages: u64,
    parent: Option<usize>,
}

/// Mutable state of one crawl run
#[derive(Default)]
struct RunState {
    visited: HashSet<String>,
}

/// Depth-bounded crawler that extracts and stores records
pub struct CrawlEngine {
    config: CrawlerConfig,
    user_agent: String,
    robots: RobotsPolicy,
    fetcher: Fetcher,
    extractor: RecordExtractor,
    store: Arc<dyn Storage>,
    cancel: CancellationToken,
}

impl CrawlEngine {
    /// Creates an engine with a Chromium-backed fetcher
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new(config: &Config, store: Arc<dyn Storage>) -> crate::Result<Self> {
        let fetcher = Fetcher::new(&config.fetcher)?;
        Ok(Self::with_fetcher(config, store, fetcher))
    }

    /// Creates an engine around an existing fetcher
    ///
    /// The robots policy shares the fetcher's HTTP client.
    pub fn with_fetcher(config: &Config, store: Arc<dyn Storage>, fetcher: Fetcher) -> Self {
        let robots = RobotsPolicy::new(fetcher.client().clone(), config.crawler.robots_mode);
        Self {
            config: config.crawler.clone(),
            user_agent: config.fetcher.user_agent.clone(),
            robots,
            fetcher,
            extractor: RecordExtractor::new(),
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop the crawl between page visits
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Crawls each seed in turn and shuts the fetcher down afterwards
    ///
    /// All seeds share one visited set, so a page reachable from two seeds
    /// is crawled once.
    ///
    /// # Returns
    ///
    /// Total pages crawled over all seeds
    pub async fn crawl_seeds(&self, seeds: &[String], max_depth: u32) -> u64 {
        let mut run = RunState::default();
        let mut total = 0;

        for seed in seeds {
            if self.cancel.is_cancelled() {
                tracing::info!("Crawl cancelled, skipping remaining seeds");
                break;
            }

            tracing::info!("Starting crawl for {}", seed);
            let pages = self.crawl_from(seed, max_depth, &mut run).await;
            tracing::info!("Completed {}: {} pages crawled", seed, pages);
            total += pages;
        }

        self.fetcher.shutdown().await;
        tracing::info!("Total pages crawled: {}", total);
        total
    }

    /// Crawls one seed with a fresh visited set
    ///
    /// The fetcher is left running.
    pub async fn crawl_seed(&self, seed: &str, max_depth: u32) -> u64 {
        let mut run = RunState::default();
        self.crawl_from(seed, max_depth, &mut run).await
    }

    async fn crawl_from(&self, seed: &str, max_depth: u32, run: &mut RunState) -> u64 {
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack = vec![Frame::Visit {
            url: seed.to_string(),
            depth: 0,
            parent: None,
        }];
        let mut root_pages = 0;

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Visit { url, depth, parent } => {
                    if self.cancel.is_cancelled() {
                        continue;
                    }
                    if !self.should_visit(&url, depth, max_depth, run).await {
                        continue;
                    }

                    run.visited.insert(url.clone());
                    self.wait_politely(&url).await;

                    let job = self.start_job(&url);
                    match self.process_page(&url, depth, max_depth, run).await {
                        Ok(children) => {
                            let node = nodes.len();
                            nodes.push(Node {
                                job,
                                pages: 1,
                                parent,
                            });
                            stack.push(Frame::Finish { node });
                            // Reversed so the first link is visited first
                            for child in children.into_iter().rev() {
                                stack.push(Frame::Visit {
                                    url: child,
                                    depth: depth + 1,
                                    parent: Some(node),
                                });
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Error crawling {}: {}", url, e);
                            self.fail_job(job, &e.to_string());
                        }
                    }
                }
                Frame::Finish { node } => {
                    let pages = nodes[node].pages;
                    match nodes[node].parent {
                        Some(parent) => nodes[parent].pages += pages,
                        None => root_pages += pages,
                    }
                    let job = nodes[node].job.clone();
                    self.complete_job(job, pages);
                }
            }
        }

        root_pages
    }

    /// Entry guard: depth bound, visited set and robots policy
    async fn should_visit(&self, url: &str, depth: u32, max_depth: u32, run: &RunState) -> bool {
        if depth > max_depth || run.visited.contains(url) {
            return false;
        }
        self.robots.can_fetch(url, &self.user_agent).await
    }

    /// Sleeps `max(robots crawl-delay, min delay)` before a page request
    ///
    /// Applies to every page, including the first one of a domain.
    async fn wait_politely(&self, url: &str) {
        let robots_delay = self.robots.crawl_delay(url, &self.user_agent).await;
        let delay = robots_delay.max(self.min_delay());

        if !delay.is_zero() {
            tracing::debug!("Waiting {:?} before requesting {}", delay, url);
            tokio::time::sleep(delay).await;
        }
    }

    fn min_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.config.min_crawl_delay_secs).unwrap_or_default()
    }

    /// Fetches a page, stores its records and returns the links to follow
    async fn process_page(
        &self,
        url: &str,
        depth: u32,
        max_depth: u32,
        run: &RunState,
    ) -> crate::Result<Vec<String>> {
        let page_url = Url::parse(url)?;
        tracing::info!("Crawling {} (depth {})", url, depth);

        let rendered = depth <= self.config.render_depth;
        let html = if rendered {
            self.fetcher.fetch_rendered(url).await
        } else {
            self.fetcher.fetch_static(url).await
        };

        match &html {
            Some(html) => self.store_records(html, url),
            None => tracing::warn!("No content fetched from {}", url),
        }

        if depth >= max_depth {
            return Ok(Vec::new());
        }

        let html = match html {
            Some(html) => Some(html),
            None if rendered => self.fetcher.fetch_static(url).await,
            None => None,
        };
        let Some(html) = html else {
            tracing::warn!("Could not fetch {} for link extraction", url);
            return Ok(Vec::new());
        };

        let links = extract_links(&html, &page_url);
        tracing::debug!("Found {} links on {}", links.len(), url);

        let limit = if depth == 0 {
            self.config.seed_link_limit
        } else {
            self.config.link_limit
        };

        Ok(links
            .into_iter()
            .take(limit)
            .map(String::from)
            .filter(|link| !run.visited.contains(link))
            .collect())
    }

    fn store_records(&self, html: &str, url: &str) {
        let records = self.extractor.extract(html, url);
        let mut saved = 0;

        for record in &records {
            match save_record(self.store.as_ref(), record) {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Error saving record from {}: {}", url, e),
            }
        }

        tracing::info!(
            "Extracted {} records from {} ({} new)",
            records.len(),
            url,
            saved
        );
    }

    // ===== Job bookkeeping =====

    fn start_job(&self, url: &str) -> CrawlJob {
        let existing = self.store.get_job(url).unwrap_or_else(|e| {
            tracing::warn!("Could not load job for {}: {}", url, e);
            None
        });

        let mut job = existing.unwrap_or_else(|| CrawlJob::new(url));
        if let Err(e) = job.begin() {
            // Left running by an interrupted or concurrent run
            tracing::warn!("{} for {}, restarting job", e, url);
            job = CrawlJob::new(url);
            job.status = crate::state::JobStatus::Running;
        }

        self.persist_job(&job);
        job
    }

    fn complete_job(&self, mut job: CrawlJob, pages: u64) {
        match job.complete(pages) {
            Ok(()) => self.persist_job(&job),
            Err(e) => tracing::warn!("Cannot complete job for {}: {}", job.url, e),
        }
    }

    fn fail_job(&self, mut job: CrawlJob, message: &str) {
        match job.fail(message) {
            Ok(()) => self.persist_job(&job),
            Err(e) => tracing::warn!("Cannot fail job for {}: {}", job.url, e),
        }
    }

    fn persist_job(&self, job: &CrawlJob) {
        if let Err(e) = self.store.upsert_job(job) {
            tracing::error!("Failed to persist job for {}: {}", job.url, e);
        }
    }
}
