//! Crawl lifecycle hooks.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use crate::browser::Page;
use crate::crawler::{CrawlResult, CrawlResults, Crawler};
use crate::Result;

/// Extension point around a crawl. Every hook is optional.
///
/// Hook errors are not contained: they stop the crawl and surface from
/// [`Crawler::crawl`].
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Runs once, before the first page is opened.
    async fn before_crawl(&self, _crawler: &Crawler) -> Result<()> {
        Ok(())
    }

    /// Runs once per successfully visited page, after its links were
    /// harvested and while the page is still open.
    async fn after_visit(
        &self,
        _page: &dyn Page,
        _url: &str,
        _depth: usize,
        _result: &CrawlResult,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs once after the traversal ends, including when it was aborted.
    async fn after_crawl(&self, _crawler: &Crawler, _results: &CrawlResults) -> Result<()> {
        Ok(())
    }
}

/// Registered plugins, in registration order.
#[derive(Default, Clone)]
pub struct PluginHost {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginHost {
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(plugin = plugin.name(), "registered plugin");
        self.plugins.push(plugin);
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub async fn before_crawl(&self, crawler: &Crawler) -> Result<()> {
        for plugin in &self.plugins {
            plugin
                .before_crawl(crawler)
                .await
                .inspect_err(|err| log_failure(plugin.as_ref(), "before_crawl", err))?;
        }
        Ok(())
    }

    pub async fn after_visit(
        &self,
        page: &dyn Page,
        url: &str,
        depth: usize,
        result: &CrawlResult,
    ) -> Result<()> {
        for plugin in &self.plugins {
            plugin
                .after_visit(page, url, depth, result)
                .await
                .inspect_err(|err| log_failure(plugin.as_ref(), "after_visit", err))?;
        }
        Ok(())
    }

    pub async fn after_crawl(&self, crawler: &Crawler, results: &CrawlResults) -> Result<()> {
        for plugin in &self.plugins {
            plugin
                .after_crawl(crawler, results)
                .await
                .inspect_err(|err| log_failure(plugin.as_ref(), "after_crawl", err))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn log_failure(plugin: &dyn Plugin, hook: &str, err: &crate::CrawlError) {
    error!(plugin = plugin.name(), hook, %err, "plugin hook failed");
}
