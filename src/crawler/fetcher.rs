//! HTTP fetcher implementation
//!
//! This module retrieves raw HTML in one of two ways:
//! - Static: a single GET with browser-like headers
//! - Rendered: a headless browser page, served by the render worker
//!
//! Neither path raises errors to the caller; failures are logged and
//! reported as "no content".

use crate::config::FetcherConfig;
use crate::crawler::renderer::{ChromiumRenderer, PageRenderer, RenderError, RenderJob, RenderQueue};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long `shutdown` waits for the render worker before aborting it
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Builds an HTTP client with browser-like default headers
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.static_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

enum RenderState {
    /// Worker not started yet
    Idle(Box<dyn PageRenderer>),
    Running(RenderQueue),
    Stopped,
}

/// Static and rendered page fetching
pub struct Fetcher {
    client: Client,
    render_timeout: Duration,
    shutdown_grace: Duration,
    rendering_disabled: AtomicBool,
    render: Mutex<RenderState>,
}

impl Fetcher {
    /// Creates a fetcher that renders with a headless Chromium
    pub fn new(config: &FetcherConfig) -> crate::Result<Self> {
        Self::with_renderer(config, Box::new(ChromiumRenderer::new(config)))
    }

    /// Creates a fetcher that renders with `renderer`
    ///
    /// The render worker is spawned on the first rendered fetch.
    pub fn with_renderer(
        config: &FetcherConfig,
        renderer: Box<dyn PageRenderer>,
    ) -> crate::Result<Self> {
        let client = build_http_client(config)?;
        let render = if config.rendering {
            RenderState::Idle(renderer)
        } else {
            RenderState::Stopped
        };

        Ok(Self {
            client,
            render_timeout: Duration::from_secs(config.render_timeout_secs),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            rendering_disabled: AtomicBool::new(!config.rendering),
            render: Mutex::new(render),
        })
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// The HTTP client used for static fetches
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn rendering_enabled(&self) -> bool {
        !self.rendering_disabled.load(Ordering::SeqCst)
    }

    /// Fetches a page with a single GET
    ///
    /// # Returns
    ///
    /// * `Some(String)` - The response body of a 2xx response
    /// * `None` - Network error, timeout or non-success status
    pub async fn fetch_static(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!("Timeout fetching {}", url);
                } else {
                    tracing::warn!("Error fetching {}: {}", url, e);
                }
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("HTTP {} fetching {}", status, url);
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!("Error reading body of {}: {}", url, e);
                None
            }
        }
    }

    /// Fetches a page through the headless browser
    ///
    /// Falls back to [`Fetcher::fetch_static`] once rendering is disabled.
    /// A timeout or a browser launch failure disables rendering for the
    /// rest of this fetcher's life; an error on a single page does not.
    pub async fn fetch_rendered(&self, url: &str) -> Option<String> {
        if !self.rendering_enabled() {
            return self.fetch_static(url).await;
        }

        let Some(sender) = self.render_sender() else {
            return self.fetch_static(url).await;
        };

        match self.submit(sender, url).await {
            Ok(html) => Some(html),
            Err(e) if e.disables_rendering() => {
                tracing::error!("{}; rendering disabled, using static fetches", e);
                self.rendering_disabled.store(true, Ordering::SeqCst);
                None
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    async fn submit(
        &self,
        sender: mpsc::Sender<RenderJob>,
        url: &str,
    ) -> Result<String, RenderError> {
        let (reply, response) = oneshot::channel();
        let job = RenderJob {
            url: url.to_string(),
            reply,
        };

        let exchange = async {
            sender.send(job).await.map_err(|_| RenderError::WorkerGone)?;
            response.await.map_err(|_| RenderError::WorkerGone)?
        };

        match tokio::time::timeout(self.render_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(self.render_timeout)),
        }
    }

    /// Returns the render queue, spawning the worker on first use
    fn render_sender(&self) -> Option<mpsc::Sender<RenderJob>> {
        let mut state = self.render.lock().ok()?;
        if let RenderState::Idle(_) = &*state {
            if let RenderState::Idle(renderer) = std::mem::replace(&mut *state, RenderState::Stopped) {
                *state = RenderState::Running(RenderQueue::spawn(renderer));
            }
        }

        match &*state {
            RenderState::Running(queue) => Some(queue.sender()),
            _ => None,
        }
    }

    /// Stops the render worker and closes the browser
    ///
    /// Later rendered fetches use static fetching.
    pub async fn shutdown(&self) {
        self.rendering_disabled.store(true, Ordering::SeqCst);

        let state = match self.render.lock() {
            Ok(mut state) => std::mem::replace(&mut *state, RenderState::Stopped),
            Err(_) => return,
        };

        if let RenderState::Running(queue) = state {
            queue.shutdown(self.shutdown_grace).await;
        }
    }
}
