//! Periodic and manual crawl triggering
//!
//! The scheduler decides which seeds are due for a crawl and runs them,
//! either on a fixed interval from a background task or on demand.

use crate::config::Config;
use crate::crawler::engine::CrawlEngine;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Schedules crawls of the configured seeds
pub struct CrawlScheduler {
    config: Config,
    store: Arc<dyn Storage>,
    stop: CancellationToken,
    /// Handed to every engine this scheduler builds
    abort: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CrawlScheduler {
    pub fn new(config: Config, store: Arc<dyn Storage>) -> Self {
        Self {
            config,
            store,
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Time between scheduled ticks
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.config.crawler.interval_hours.saturating_mul(3600))
    }

    /// Returns the seeds whose last crawl is at least one interval old
    ///
    /// A seed without a job, or whose job was never crawled, is due.
    /// Seeds whose job cannot be read are treated as due.
    pub fn due_seeds(&self, now: DateTime<Utc>) -> Vec<String> {
        let interval = chrono::Duration::from_std(self.interval())
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));

        self.config
            .seeds
            .iter()
            .filter(|seed| match self.store.get_job(seed) {
                Ok(Some(job)) => match job.last_crawled {
                    Some(last) => now - last >= interval,
                    None => true,
                },
                Ok(None) => true,
                Err(e) => {
                    tracing::warn!("Could not load job for {}: {}", seed, e);
                    true
                }
            })
            .cloned()
            .collect()
    }

    /// Crawls the seeds that are currently due
    ///
    /// # Returns
    ///
    /// Total pages crawled
    pub async fn run_tick(&self) -> crate::Result<u64> {
        let due = self.due_seeds(Utc::now());
        if due.is_empty() {
            tracing::info!("No seeds due for crawling");
            return Ok(0);
        }

        tracing::info!("{} of {} seeds due for crawling", due.len(), self.config.seeds.len());
        self.crawl(&due).await
    }

    /// Crawls `urls`, or every configured seed, regardless of the interval
    pub async fn trigger(&self, urls: Option<Vec<String>>) -> crate::Result<u64> {
        let urls = urls.unwrap_or_else(|| self.config.seeds.clone());
        if urls.is_empty() {
            tracing::info!("Nothing to crawl");
            return Ok(0);
        }

        tracing::info!("Manual crawl of {} URLs", urls.len());
        self.crawl(&urls).await
    }

    async fn crawl(&self, urls: &[String]) -> crate::Result<u64> {
        let engine = CrawlEngine::new(&self.config, self.store.clone())?
            .with_cancellation(self.abort.child_token());
        Ok(engine
            .crawl_seeds(urls, self.config.crawler.max_depth)
            .await)
    }

    /// Spawns the periodic tick task and returns immediately
    ///
    /// The first tick fires one interval after start. With `run-on-start`
    /// all seeds are crawled right away instead of waiting for it.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut task) = self.task.lock() else {
            tracing::error!("Scheduler state poisoned, not starting");
            return;
        };
        if task.is_some() {
            tracing::warn!("Scheduler already started");
            return;
        }

        let scheduler = Arc::clone(self);
        *task = Some(tokio::spawn(async move { scheduler.run_loop().await }));
        tracing::info!(
            "Scheduler started, crawling every {} hours",
            self.config.crawler.interval_hours
        );
    }

    async fn run_loop(&self) {
        if self.config.crawler.run_on_start {
            tracing::info!("Running initial crawl");
            if let Err(e) = self.trigger(None).await {
                tracing::error!("Initial crawl failed: {}", e);
            }
        }

        let period = self.interval().max(Duration::from_secs(1));
        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = ticks.tick() => {
                    // Runs to completion even if stop is requested meanwhile
                    if let Err(e) = self.run_tick().await {
                        tracing::error!("Scheduled crawl failed: {}", e);
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Cancels future ticks
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Stops running and future crawls after their current page
    ///
    /// Unlike [`CrawlScheduler::stop`] this interrupts an in-flight crawl.
    /// Later ticks and triggers of this scheduler crawl nothing.
    pub fn abort_crawls(&self) {
        self.abort.cancel();
    }

    /// Stops the scheduler and waits for the tick task to exit
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Scheduler task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }
}
