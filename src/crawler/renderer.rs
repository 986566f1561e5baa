//! Headless browser rendering
//!
//! A single worker task owns the [`PageRenderer`] and serves render jobs
//! from a queue, one at a time. Callers submit a URL and wait on a oneshot
//! reply.

use crate::config::FetcherConfig;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Pending jobs allowed in the render queue before submitters wait
const QUEUE_CAPACITY: usize = 16;

/// How long the page must have no request in flight to count as idle
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Errors produced while rendering a page
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Failed to render {url}: {message}")]
    Page { url: String, message: String },

    #[error("Render timed out after {0:?}")]
    Timeout(Duration),

    #[error("Render worker is not running")]
    WorkerGone,
}

impl RenderError {
    /// True for failures after which no further rendering should be attempted
    pub fn disables_rendering(&self) -> bool {
        !matches!(self, Self::Page { .. })
    }
}

/// Something that turns a URL into rendered DOM HTML
#[async_trait]
pub trait PageRenderer: Send {
    /// Loads `url`, waits for it to settle and returns the serialized DOM
    async fn render(&mut self, url: &str) -> Result<String, RenderError>;

    /// Releases any browser resources
    async fn close(&mut self);
}

/// Chromium renderer driven over the DevTools protocol
///
/// The browser is launched on the first render. After the load event a
/// render waits for network idle, tracked from the page's network events,
/// then for the settle delay. A page whose network never goes quiet is
/// read after a third of the request timeout.
pub struct ChromiumRenderer {
    user_agent: String,
    settle_delay: Duration,
    request_timeout: Duration,
    chrome_executable: Option<String>,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
}

impl ChromiumRenderer {
    pub fn new(config: &FetcherConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            request_timeout: Duration::from_secs(config.render_timeout_secs),
            chrome_executable: config.chrome_executable.clone(),
            browser: None,
            handler_task: None,
        }
    }

    async fn launch(&mut self) -> Result<(), RenderError> {
        if self.browser.is_some() {
            return Ok(());
        }

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.request_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!("Launched headless browser");
        self.browser = Some(browser);
        self.handler_task = Some(task);
        Ok(())
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&mut self, url: &str) -> Result<String, RenderError> {
        self.launch().await?;
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::Launch("browser not available".to_string()))?;

        let page_error = |e: chromiumoxide::error::CdpError| RenderError::Page {
            url: url.to_string(),
            message: e.to_string(),
        };

        let page = browser.new_page("about:blank").await.map_err(page_error)?;
        page.set_user_agent(self.user_agent.as_str())
            .await
            .map_err(page_error)?;
        page.execute(EnableParams::default())
            .await
            .map_err(page_error)?;
        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(page_error)?
            .map(|event| event.request_id.inner().clone());
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(page_error)?
            .map(|event| event.request_id.inner().clone());
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(page_error)?
            .map(|event| event.request_id.inner().clone());

        page.goto(url).await.map_err(page_error)?;
        page.wait_for_navigation().await.map_err(page_error)?;

        let done = futures::stream::select(finished, failed);
        if !wait_for_network_idle(started, done, self.request_timeout / 3).await {
            tracing::debug!("Network still busy on {}, reading the DOM anyway", url);
        }
        tokio::time::sleep(self.settle_delay).await;

        let content = page.content().await.map_err(page_error);
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }
        content
    }

    async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::debug!("Error closing browser: {}", e);
            }
            let _ = browser.wait().await;
            tracing::info!("Closed headless browser");
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

/// One queued render request
pub(crate) struct RenderJob {
    pub url: String,
    pub reply: oneshot::Sender<Result<String, RenderError>>,
}

/// Handle to a running render worker
pub(crate) struct RenderQueue {
    sender: mpsc::Sender<RenderJob>,
    task: JoinHandle<()>,
}

impl RenderQueue {
    /// Spawns the worker task that owns `renderer`
    pub fn spawn(renderer: Box<dyn PageRenderer>) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let task = tokio::spawn(run_worker(renderer, receiver));
        Self { sender, task }
    }

    pub fn sender(&self) -> mpsc::Sender<RenderJob> {
        self.sender.clone()
    }

    /// Closes the queue and waits up to `grace` for the worker to finish
    ///
    /// A worker still busy after `grace` (for example on a render that
    /// already timed out for its caller) is aborted.
    pub async fn shutdown(self, grace: Duration) {
        let Self { sender, mut task } = self;
        drop(sender);

        match tokio::time::timeout(grace, &mut task).await {
            Ok(_) => tracing::debug!("Render worker stopped"),
            Err(_) => {
                tracing::warn!("Render worker did not stop within {:?}, aborting", grace);
                task.abort();
            }
        }
    }
}

/// Waits until no request has been in flight for [`NETWORK_IDLE_WINDOW`]
///
/// `started` and `done` yield request ids. Returns false if `limit`
/// passes first.
async fn wait_for_network_idle(
    started: impl Stream<Item = String>,
    done: impl Stream<Item = String>,
    limit: Duration,
) -> bool {
    tokio::pin!(started);
    tokio::pin!(done);
    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);

    let mut in_flight = HashSet::new();
    // Completions seen before their start event
    let mut done_early = HashSet::new();

    loop {
        let quiet = tokio::time::sleep(NETWORK_IDLE_WINDOW);
        tokio::select! {
            _ = &mut deadline => return false,
            _ = quiet, if in_flight.is_empty() => return true,
            Some(id) = started.next() => {
                if !done_early.remove(&id) {
                    in_flight.insert(id);
                }
            }
            Some(id) = done.next() => {
                if !in_flight.remove(&id) {
                    done_early.insert(id);
                }
            }
        }
    }
}

async fn run_worker(mut renderer: Box<dyn PageRenderer>, mut jobs: mpsc::Receiver<RenderJob>) {
    while let Some(job) = jobs.recv().await {
        let result = renderer.render(&job.url).await;
        if job.reply.send(result).is_err() {
            tracing::debug!("Render result for {} discarded, caller gave up", job.url);
        }
    }
    renderer.close().await;
}
