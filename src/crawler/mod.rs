//! Fail-fast, same-origin site traversal.
//!
//! # Module Structure
//!
//! - [`queue`] - FIFO work queue and visited set
//! - [`links`] - Same-origin link discovery
//! - [`session`] - Per-page event classification
//! - `result` - Per-URL results and the crawl-wide result map

pub mod links;
pub mod queue;
mod result;
pub mod session;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::{Browser, BrowserContext, ContextOptions, Page, WaitUntil};
use crate::plugin::{Plugin, PluginHost};
use crate::signal::CrawlAbortSignal;
use crate::Result;

pub use links::{normalize_url, LinkDiscoverer};
pub use queue::{CrawlQueue, CrawlQueueItem, VisitedSet};
pub use result::{CrawlResult, CrawlResults, FailedRequest, PageError, PageErrorKind};
pub use session::{IgnorePatterns, PageSession};

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Blank document each visited page is sent to before it closes.
pub const UNLOAD_URL: &str = "about:blank";

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    /// Deepest link level visited; `None` means unlimited.
    pub max_depth: Option<usize>,
    pub headless: bool,
    /// Accepted for compatibility; pages are processed one at a time.
    pub concurrency: usize,
    /// Visit only the start URL.
    pub single_page: bool,
    /// Console error texts matching any of these are not failures.
    pub ignore_patterns: Vec<String>,
    /// Informational; echoed in the report.
    pub cache_extensions: Vec<String>,
    pub show_probe: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub navigation_timeout: Duration,
    pub network_idle_timeout: Duration,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            headless: true,
            concurrency: 1,
            single_page: false,
            ignore_patterns: Vec::new(),
            cache_extensions: Vec::new(),
            show_probe: false,
            verbose: false,
            quiet: false,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            network_idle_timeout: DEFAULT_NETWORK_IDLE_TIMEOUT,
        }
    }
}

enum Visit {
    Continue,
    Abort,
}

/// Drives one browser across the pages reachable from a start URL.
pub struct Crawler {
    browser: Arc<dyn Browser>,
    options: CrawlerOptions,
    ignore: Arc<IgnorePatterns>,
    plugins: PluginHost,
    signal: CrawlAbortSignal,
}

impl Crawler {
    /// Fails if an ignore pattern is not a valid regex.
    pub fn new(browser: Arc<dyn Browser>, options: CrawlerOptions) -> Result<Self> {
        let ignore = Arc::new(IgnorePatterns::new(&options.ignore_patterns)?);
        if options.concurrency > 1 {
            debug!(
                concurrency = options.concurrency,
                "pages are processed sequentially"
            );
        }
        Ok(Self {
            browser,
            options,
            ignore,
            plugins: PluginHost::default(),
            signal: CrawlAbortSignal::new(),
        })
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.register(plugin);
    }

    pub fn plugins(&self) -> &PluginHost {
        &self.plugins
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    pub fn options(&self) -> &CrawlerOptions {
        &self.options
    }

    pub fn abort_signal(&self) -> &CrawlAbortSignal {
        &self.signal
    }

    /// Crawls from `start_url`.
    ///
    /// A page failure does not make this return `Err`: it sets the abort
    /// signal, stops the traversal and is reported through
    /// [`CrawlResults::errored`]. `Err` is reserved for an unusable start URL,
    /// browser driver failures and plugin hook errors.
    pub async fn crawl(&self, start_url: &str) -> Result<CrawlResults> {
        let start = normalize_url(start_url)?;
        let discoverer = LinkDiscoverer::new(&start);
        let mut queue = CrawlQueue::new();
        queue.push(start.as_str(), 0);

        self.plugins.before_crawl(self).await?;

        info!(
            url = %start,
            max_depth = ?self.options.max_depth,
            single_page = self.options.single_page,
            "starting crawl"
        );
        let context = self.browser.new_context(ContextOptions::default()).await?;
        let mut results = CrawlResults::default();
        let outcome = self
            .run_loop(context.as_ref(), &discoverer, &mut queue, &mut results)
            .await;
        if let Err(err) = context.close().await {
            warn!(%err, "failed to close crawl context");
        }
        outcome?;

        results.set_abort(self.signal.reason());
        match results.abort_reason() {
            Some(reason) => warn!(
                url = %reason.url,
                message = %reason.error.message,
                pages = results.len(),
                "crawl aborted"
            ),
            None => info!(pages = results.len(), "crawl finished"),
        }

        self.plugins.after_crawl(self, &results).await?;
        Ok(results)
    }

    async fn run_loop(
        &self,
        context: &dyn BrowserContext,
        discoverer: &LinkDiscoverer,
        queue: &mut CrawlQueue,
        results: &mut CrawlResults,
    ) -> Result<()> {
        let mut visited = VisitedSet::default();

        while !self.signal.is_triggered() {
            let Some(item) = queue.pop() else { break };

            if self.options.max_depth.is_some_and(|max| item.depth > max) {
                debug!(url = %item.url, depth = item.depth, "beyond max depth, skipping");
                continue;
            }
            if !visited.mark(&item.url) {
                continue;
            }

            let page = context.new_page().await?;
            let session = PageSession::new(
                item.url.clone(),
                Arc::clone(&self.ignore),
                self.signal.clone(),
                self.options.show_probe,
            );
            session.attach(page.as_ref());

            let visit = self
                .visit(page.as_ref(), &session, &item, discoverer, queue)
                .await;

            if let Err(err) = page
                .goto(UNLOAD_URL, WaitUntil::Load, self.options.navigation_timeout)
                .await
            {
                debug!(url = %item.url, %err, "unload navigation failed");
            }
            if let Err(err) = page.close().await {
                warn!(url = %item.url, %err, "failed to close page");
            }
            results.insert(session.snapshot(item.depth));

            if matches!(visit?, Visit::Abort) {
                break;
            }
        }
        Ok(())
    }

    async fn visit(
        &self,
        page: &dyn Page,
        session: &PageSession,
        item: &CrawlQueueItem,
        discoverer: &LinkDiscoverer,
        queue: &mut CrawlQueue,
    ) -> Result<Visit> {
        info!(url = %item.url, depth = item.depth, "visiting");

        let navigation = tokio::select! {
            biased;
            _ = self.signal.triggered() => return Ok(Visit::Abort),
            nav = page.goto(&item.url, WaitUntil::DomContentLoaded, self.options.navigation_timeout) => nav,
        };
        if let Err(err) = navigation {
            session.record_navigation_failure(&err);
            return Ok(Visit::Abort);
        }

        match page
            .wait_for_load_state(WaitUntil::NetworkIdle, self.options.network_idle_timeout)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_timeout() => {
                debug!(url = %item.url, "network did not go idle, continuing");
            }
            Err(err) => debug!(url = %item.url, %err, "network idle wait failed, continuing"),
        }

        if self.signal.is_triggered() {
            return Ok(Visit::Abort);
        }

        if !self.options.single_page {
            let links = discoverer.harvest(page, &item.url).await;
            let mut added = 0usize;
            for link in links {
                if queue.push(link, item.depth + 1) {
                    added += 1;
                }
            }
            debug!(url = %item.url, added, queued = queue.len(), "harvested links");
        }

        let snapshot = session.snapshot(item.depth);
        self.plugins
            .after_visit(page, &item.url, item.depth, &snapshot)
            .await?;
        Ok(Visit::Continue)
    }
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("options", &self.options)
            .field("plugins", &self.plugins.names())
            .field("aborted", &self.signal.is_triggered())
            .finish()
    }
}
